//! Modular sequence-number arithmetic.
//!
//! Wire sequence numbers cycle through `1..=N`; `0` never appears on the
//! wire. Engines track packets by an absolute `u64` index and map it to a
//! wire value with [`SeqSpace::wire`].
//!
//! ```text
//!   N = 5:   1 → 2 → 3 → 4 → 5 → 1 → 2 ...
//!
//!   in_window(seq, base = 4, size = 3)  ⇔  seq ∈ {4, 5, 1}
//! ```
//!
//! Comparisons are always made by forward distance from a reference point,
//! never by integer magnitude, so `1` is "after" `5` when the base is `4`.

/// A fixed-size cyclic sequence space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u32,
}

impl SeqSpace {
    /// Create a space with `modulus` distinct wire values.
    ///
    /// # Panics
    ///
    /// Panics if `modulus < 2`; [`crate::config::TransferConfig::validate`]
    /// rejects such configurations before they reach here.
    pub fn new(modulus: u32) -> Self {
        assert!(modulus >= 2, "sequence space must hold at least 2 values");
        Self { modulus }
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    /// First wire value of a fresh transfer.
    pub fn first(&self) -> u32 {
        1
    }

    /// `true` if `seq` is a valid wire value.
    pub fn contains(&self, seq: u32) -> bool {
        (1..=self.modulus).contains(&seq)
    }

    /// The wire value that follows `seq`, wrapping `N → 1`.
    pub fn advance(&self, seq: u32) -> u32 {
        seq % self.modulus + 1
    }

    /// The wire value `steps` positions behind `seq`.
    pub fn retreat(&self, seq: u32, steps: u32) -> u32 {
        let m = u64::from(self.modulus);
        let zero_based = (u64::from(seq) + m - 1 - u64::from(steps) % m) % m;
        zero_based as u32 + 1
    }

    /// Map an absolute packet index (0-based) to its wire value.
    pub fn wire(&self, index: u64) -> u32 {
        (index % u64::from(self.modulus)) as u32 + 1
    }

    /// Number of forward steps from `from` to `to`, in `0..N`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let m = u64::from(self.modulus);
        ((u64::from(to) + m - u64::from(from) % m) % m) as u32
    }

    /// `true` iff `seq` lies in the half-open modular interval
    /// `[base, base + size)`.
    pub fn in_window(&self, seq: u32, base: u32, size: u32) -> bool {
        self.contains(seq) && self.distance(base, seq) < size
    }
}
