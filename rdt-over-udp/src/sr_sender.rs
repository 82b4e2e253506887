//! Selective-Repeat send-side state machine.
//!
//! [`SrSender`] shares the window bookkeeping of Go-Back-N but differs in
//! granularity:
//!
//! - ACKs are **individual**: ACK `s` acknowledges exactly packet `s`.
//! - Every in-flight packet has its own send timestamp. On each scheduling
//!   tick, a packet older than `timeout` that is still unacknowledged is
//!   retransmitted on its own and its timestamp reset.
//! - The base only advances when the packet at the base is acknowledged,
//!   and then skips over every packet that was acknowledged out of order.
//! - Sent payloads are kept in a retransmission cache until the base moves
//!   past them.
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::seq::SeqSpace;
use crate::timer::expired_since;
use crate::window::{AckOutcome, Outgoing, SendWindow, WindowCore, WindowError};

/// A sent packet awaiting its individual acknowledgement.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<u8>,
    /// Total transmissions so far (1 = first send).
    tx_count: u32,
}

/// Selective-Repeat send-side state for one file transfer.
#[derive(Debug)]
pub struct SrSender {
    core: WindowCore,
    timeout: Duration,
    /// Keyed by wire sequence number.
    cache: HashMap<u32, CacheEntry>,
    max_retries: u32,
}

impl SrSender {
    /// Create a new [`SrSender`] over `chunks`.
    ///
    /// `window_size` must be at most half the sequence space; otherwise a
    /// retransmitted packet could be confused with a new one that reuses
    /// its sequence number.
    pub fn new(
        chunks: Vec<Vec<u8>>,
        window_size: u32,
        space: SeqSpace,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        assert!(
            window_size * 2 <= space.modulus(),
            "SR window must be at most half the sequence space"
        );
        Self {
            core: WindowCore::new(chunks, window_size, space),
            timeout,
            cache: HashMap::new(),
            max_retries,
        }
    }

    /// Number of payloads held for retransmission.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, seq: u32) -> bool {
        self.cache.contains_key(&seq)
    }
}

impl SendWindow for SrSender {
    fn label(&self) -> &'static str {
        "sr"
    }

    fn core(&self) -> &WindowCore {
        &self.core
    }

    fn next_new(&mut self, now: Instant) -> Option<Outgoing> {
        let out = self.core.take_next(now)?;
        self.cache.insert(
            out.seq,
            CacheEntry {
                payload: out.payload.clone(),
                tx_count: 1,
            },
        );
        Some(out)
    }

    fn on_ack(&mut self, seq: u32, _now: Instant) -> AckOutcome {
        let Some(index) = self.core.index_of(seq) else {
            return AckOutcome::OutOfWindow;
        };
        if self.core.is_acked(index) {
            return AckOutcome::Duplicate;
        }
        self.core.mark_acked(index);
        if index != self.core.base() {
            return AckOutcome::Marked;
        }

        let moved = self.core.advance_base();
        let space = self.core.space();
        for passed in moved.clone() {
            self.cache.remove(&space.wire(passed));
        }
        AckOutcome::Advanced(moved.end - moved.start)
    }

    fn poll_timeouts(&mut self, now: Instant) -> Result<Vec<Outgoing>, WindowError> {
        let mut resend = Vec::new();
        for index in self.core.unacked() {
            let due = self
                .core
                .sent_at(index)
                .is_some_and(|sent| expired_since(sent, self.timeout, now));
            if !due {
                continue;
            }
            let seq = self.core.space().wire(index);
            let Some(entry) = self.cache.get_mut(&seq) else {
                continue;
            };
            if entry.tx_count > self.max_retries {
                return Err(WindowError::RetriesExhausted {
                    seq,
                    attempts: entry.tx_count,
                });
            }
            entry.tx_count += 1;
            resend.push(Outgoing {
                index,
                seq,
                payload: entry.payload.clone(),
                retransmit: true,
            });
            self.core.stamp(index, now);
        }
        Ok(resend)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
