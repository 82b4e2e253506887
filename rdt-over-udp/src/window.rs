//! Shared sliding-window machinery and the protocol-variant seams.
//!
//! Go-Back-N and Selective Repeat differ in only two places: how an ACK is
//! interpreted (cumulative vs. individual) and what a timeout retransmits
//! (the whole window vs. one packet). Everything else (window bounds,
//! sequence mapping, acknowledged flags, send timestamps, lifecycle state)
//! lives in [`WindowCore`]. The variants implement [`SendWindow`] /
//! [`RecvWindow`] and the I/O drivers in [`crate::transfer`] are generic
//! over those traits.
//!
//! # Sender window layout
//!
//! ```text
//!        base               next_to_send        base + window
//!          │                     │                    │
//!  ────────┼─────────────────────┼────────────────────┼──────────▶ index
//!   acked  │ <──── in flight ──▶ │ <──── sendable ──▶ │  not yet
//! ```
//!
//! Indices are absolute (`0..total`); only [`crate::seq::SeqSpace::wire`]
//! turns them into the cyclic numbers carried on the wire.

use std::ops::Range;
use std::time::Instant;

use thiserror::Error;

use crate::seq::SeqSpace;
use crate::state::{ReceiverState, SenderState};

/// Split a byte stream into fixed-size payloads. The last chunk may be short.
pub fn chunk(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}

/// A data packet the driver should put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Absolute packet index within the file.
    pub index: u64,
    /// Wire sequence number.
    pub seq: u32,
    pub payload: Vec<u8>,
    pub retransmit: bool,
}

/// What processing one ACK did to the sender window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The base advanced by this many packets.
    Advanced(u64),
    /// An out-of-order packet was marked; the base did not move.
    Marked,
    /// The ACK refers to a packet already acknowledged.
    Duplicate,
    /// The ACK does not name any in-flight packet.
    OutOfWindow,
}

/// What a receiver did with one data packet, plus the ACK to send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvOutcome {
    /// Sequence number to acknowledge, if any.
    pub ack: Option<u32>,
    pub disposition: Disposition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// This many packets were appended to the output (the arrival itself
    /// plus any drained from the reorder buffer).
    Delivered(usize),
    /// Parked in the reorder buffer.
    Buffered,
    /// Already received; not delivered again.
    Duplicate,
    /// Dropped without delivery.
    Discarded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("packet seq={seq} unacknowledged after {attempts} attempts")]
    RetriesExhausted { seq: u32, attempts: u32 },
}

/// Send side of a window protocol.
///
/// Implementations manage state only; all socket I/O and loss simulation is
/// the caller's responsibility.
pub trait SendWindow {
    /// Short tag used in log lines.
    fn label(&self) -> &'static str;

    fn core(&self) -> &WindowCore;

    /// Take the next never-sent packet if the window has room.
    fn next_new(&mut self, now: Instant) -> Option<Outgoing>;

    /// Process an inbound ACK carrying wire sequence `seq`.
    fn on_ack(&mut self, seq: u32, now: Instant) -> AckOutcome;

    /// Collect every packet whose timer has expired as of `now`.
    fn poll_timeouts(&mut self, now: Instant) -> Result<Vec<Outgoing>, WindowError>;

    fn is_done(&self) -> bool {
        self.core().is_done()
    }
}

/// Receive side of a window protocol.
pub trait RecvWindow {
    fn label(&self) -> &'static str;

    /// Process a data packet carrying wire sequence `seq`.
    fn on_data(&mut self, seq: u32, payload: &[u8]) -> RecvOutcome;

    /// End-of-stream seen; the output is final.
    fn finish(&mut self);

    fn state(&self) -> ReceiverState;

    fn output(&self) -> &[u8];

    fn into_output(self) -> Vec<u8>;
}

/// Window bookkeeping common to both sender variants.
#[derive(Debug)]
pub struct WindowCore {
    space: SeqSpace,
    window_size: u32,
    chunks: Vec<Vec<u8>>,
    base: u64,
    next: u64,
    /// Indexed by wire sequence number (slot 0 unused).
    acked: Vec<bool>,
    /// Last transmission time per slot.
    sent_at: Vec<Option<Instant>>,
    state: SenderState,
}

impl WindowCore {
    pub fn new(chunks: Vec<Vec<u8>>, window_size: u32, space: SeqSpace) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        let slots = space.modulus() as usize + 1;
        let mut core = Self {
            space,
            window_size,
            chunks,
            base: 0,
            next: 0,
            acked: vec![false; slots],
            sent_at: vec![None; slots],
            state: SenderState::Idle,
        };
        core.update_state();
        core
    }

    pub fn space(&self) -> SeqSpace {
        self.space
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Oldest unacknowledged index.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn next_to_send(&self) -> u64 {
        self.next
    }

    pub fn total(&self) -> u64 {
        self.chunks.len() as u64
    }

    pub fn in_flight(&self) -> u64 {
        self.next - self.base
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.base == self.total()
    }

    pub fn base_seq(&self) -> u32 {
        self.space.wire(self.base)
    }

    pub fn slot(&self, index: u64) -> usize {
        self.space.wire(index) as usize
    }

    pub fn payload(&self, index: u64) -> &[u8] {
        &self.chunks[index as usize]
    }

    /// `true` when a new packet may enter the window.
    pub fn can_send(&self) -> bool {
        self.next < self.total() && self.next < self.base + u64::from(self.window_size)
    }

    /// Move `next_to_send` forward by one and return the packet it covered.
    ///
    /// Resets the slot's acknowledged flag (the slot may be reused from an
    /// earlier lap of the sequence space) and stamps its send time.
    pub fn take_next(&mut self, now: Instant) -> Option<Outgoing> {
        if !self.can_send() {
            return None;
        }
        let index = self.next;
        let slot = self.slot(index);
        self.acked[slot] = false;
        self.sent_at[slot] = Some(now);
        self.next += 1;
        self.update_state();
        Some(Outgoing {
            index,
            seq: self.space.wire(index),
            payload: self.chunks[index as usize].clone(),
            retransmit: false,
        })
    }

    /// Resolve a wire sequence number to the in-flight index it names.
    ///
    /// The match is by forward distance from the base, so it is correct
    /// across wraparound as long as the window is smaller than the space.
    pub fn index_of(&self, seq: u32) -> Option<u64> {
        if !self.space.contains(seq) {
            return None;
        }
        let offset = u64::from(self.space.distance(self.base_seq(), seq));
        (offset < self.in_flight()).then_some(self.base + offset)
    }

    pub fn is_acked(&self, index: u64) -> bool {
        self.acked[self.slot(index)]
    }

    pub fn mark_acked(&mut self, index: u64) {
        let slot = self.slot(index);
        self.acked[slot] = true;
    }

    /// Slide the base over the longest acknowledged prefix of the window.
    ///
    /// Returns the indices the base moved past.
    pub fn advance_base(&mut self) -> Range<u64> {
        let start = self.base;
        while self.base < self.next && self.is_acked(self.base) {
            self.base += 1;
        }
        self.update_state();
        start..self.base
    }

    pub fn sent_at(&self, index: u64) -> Option<Instant> {
        self.sent_at[self.slot(index)]
    }

    pub fn stamp(&mut self, index: u64, now: Instant) {
        let slot = self.slot(index);
        self.sent_at[slot] = Some(now);
    }

    /// In-flight indices that still await an acknowledgement.
    pub fn unacked(&self) -> Vec<u64> {
        (self.base..self.next)
            .filter(|&i| !self.is_acked(i))
            .collect()
    }

    fn update_state(&mut self) {
        self.state = if self.is_done() {
            SenderState::Done
        } else if self.next == self.total() {
            SenderState::Draining
        } else if self.next == 0 {
            SenderState::Idle
        } else {
            SenderState::Sending
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(packets: usize, window: u32, modulus: u32) -> WindowCore {
        let chunks = (0..packets).map(|i| vec![i as u8]).collect();
        WindowCore::new(chunks, window, SeqSpace::new(modulus))
    }

    #[test]
    fn chunk_splits_with_short_tail() {
        let parts = chunk(&[7u8; 5000], 1024);
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[4].len(), 5000 - 4 * 1024);
        assert!(chunk(&[], 1024).is_empty());
    }

    #[test]
    fn fills_up_to_window() {
        let now = Instant::now();
        let mut c = core(10, 4, 20);
        assert_eq!(c.state(), SenderState::Idle);
        let seqs: Vec<u32> = std::iter::from_fn(|| c.take_next(now)).map(|o| o.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert_eq!(c.in_flight(), 4);
        assert!(!c.can_send());
        assert_eq!(c.state(), SenderState::Sending);
    }

    #[test]
    fn empty_file_is_done_immediately() {
        let c = core(0, 4, 20);
        assert!(c.is_done());
        assert_eq!(c.state(), SenderState::Done);
    }

    #[test]
    fn index_of_only_matches_in_flight() {
        let now = Instant::now();
        let mut c = core(10, 4, 20);
        c.take_next(now);
        c.take_next(now);
        assert_eq!(c.index_of(1), Some(0));
        assert_eq!(c.index_of(2), Some(1));
        assert_eq!(c.index_of(3), None);
        assert_eq!(c.index_of(0), None);
        assert_eq!(c.index_of(20), None);
    }

    #[test]
    fn index_of_across_wraparound() {
        let now = Instant::now();
        let mut c = core(12, 3, 5);
        // Push the base to index 4 (wire 5).
        for _ in 0..3 {
            c.take_next(now);
        }
        for i in 0..3 {
            c.mark_acked(i);
        }
        c.advance_base();
        c.take_next(now);
        c.mark_acked(3);
        c.advance_base();
        assert_eq!(c.base(), 4);
        for _ in 0..3 {
            c.take_next(now);
        }
        // In flight: indices 4, 5, 6 → wire 5, 1, 2.
        assert_eq!(c.base_seq(), 5);
        assert_eq!(c.index_of(5), Some(4));
        assert_eq!(c.index_of(1), Some(5));
        assert_eq!(c.index_of(2), Some(6));
        assert_eq!(c.index_of(4), None, "previous lap must not match");
    }

    #[test]
    fn advance_base_stops_at_first_gap() {
        let now = Instant::now();
        let mut c = core(10, 4, 20);
        while c.take_next(now).is_some() {}
        c.mark_acked(0);
        c.mark_acked(2);
        assert_eq!(c.advance_base(), 0..1);
        assert_eq!(c.base(), 1);
        c.mark_acked(1);
        assert_eq!(c.advance_base(), 1..3);
        assert_eq!(c.unacked(), vec![3]);
    }

    #[test]
    fn reused_slot_starts_unacked() {
        let now = Instant::now();
        let mut c = core(6, 2, 3);
        for round in 0..3u64 {
            let a = c.take_next(now).unwrap();
            let b = c.take_next(now).unwrap();
            assert!(!c.is_acked(a.index) && !c.is_acked(b.index), "round {round}");
            c.mark_acked(a.index);
            c.mark_acked(b.index);
            c.advance_base();
        }
        assert!(c.is_done());
    }

    #[test]
    fn state_moves_through_draining_to_done() {
        let now = Instant::now();
        let mut c = core(2, 4, 20);
        c.take_next(now);
        assert_eq!(c.state(), SenderState::Sending);
        c.take_next(now);
        assert_eq!(c.state(), SenderState::Draining);
        c.mark_acked(0);
        c.mark_acked(1);
        c.advance_base();
        assert_eq!(c.state(), SenderState::Done);
    }
}
