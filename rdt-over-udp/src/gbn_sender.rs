//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a sliding window of up to `N` in-flight packets.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets may be in flight at once.
//! - ACKs are **cumulative**: ACK `a` means the receiver has accepted every
//!   packet up to and including wire sequence `a`.
//! - A single retransmission timer covers the whole window. It is armed
//!   whenever something is in flight and disarmed when the window drains.
//! - On timeout, **every** unacknowledged packet from `base` onwards is
//!   retransmitted (go back N) and the timer is rearmed.
//! - Consecutive timeouts with no progress are bounded by `max_retries`.
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use std::time::{Duration, Instant};

use crate::seq::SeqSpace;
use crate::timer::RetransmitTimer;
use crate::window::{AckOutcome, Outgoing, SendWindow, WindowCore, WindowError};

/// Go-Back-N send-side state for one file transfer.
#[derive(Debug)]
pub struct GbnSender {
    core: WindowCore,
    timer: RetransmitTimer,
    /// Timeouts since the base last moved.
    stalled_timeouts: u32,
    max_retries: u32,
}

impl GbnSender {
    /// Create a new [`GbnSender`] over `chunks`.
    ///
    /// `window_size` must be smaller than the sequence space so that a
    /// cumulative ACK cannot be mistaken for one from the previous lap.
    pub fn new(
        chunks: Vec<Vec<u8>>,
        window_size: u32,
        space: SeqSpace,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        assert!(
            window_size < space.modulus(),
            "GBN window must be smaller than the sequence space"
        );
        Self {
            core: WindowCore::new(chunks, window_size, space),
            timer: RetransmitTimer::new(timeout),
            stalled_timeouts: 0,
            max_retries,
        }
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }
}

impl SendWindow for GbnSender {
    fn label(&self) -> &'static str {
        "gbn"
    }

    fn core(&self) -> &WindowCore {
        &self.core
    }

    fn next_new(&mut self, now: Instant) -> Option<Outgoing> {
        let out = self.core.take_next(now)?;
        if !self.timer.is_armed() {
            self.timer.arm(now);
        }
        Some(out)
    }

    /// Process a cumulative ACK.
    ///
    /// An ACK naming an in-flight packet marks everything from `base` up to
    /// it as acknowledged and slides the base. Duplicates of an older ACK
    /// resolve to no in-flight packet and change nothing.
    fn on_ack(&mut self, seq: u32, now: Instant) -> AckOutcome {
        let Some(upto) = self.core.index_of(seq) else {
            return AckOutcome::OutOfWindow;
        };
        for index in self.core.base()..=upto {
            self.core.mark_acked(index);
        }
        let moved = self.core.advance_base();
        let advanced = moved.end - moved.start;
        if advanced == 0 {
            return AckOutcome::Duplicate;
        }

        self.stalled_timeouts = 0;
        if self.core.in_flight() > 0 {
            // Restart the timer for the new oldest packet.
            self.timer.arm(now);
        } else {
            self.timer.disarm();
        }
        AckOutcome::Advanced(advanced)
    }

    fn poll_timeouts(&mut self, now: Instant) -> Result<Vec<Outgoing>, WindowError> {
        if !self.timer.expired(now) {
            return Ok(Vec::new());
        }
        if self.core.in_flight() == 0 {
            self.timer.disarm();
            return Ok(Vec::new());
        }

        self.stalled_timeouts += 1;
        if self.stalled_timeouts > self.max_retries {
            return Err(WindowError::RetriesExhausted {
                seq: self.core.base_seq(),
                attempts: self.stalled_timeouts,
            });
        }

        // Go-Back-N: every unacked packet from base onwards goes out again.
        let resend = self
            .core
            .unacked()
            .into_iter()
            .map(|index| {
                self.core.stamp(index, now);
                Outgoing {
                    index,
                    seq: self.core.space().wire(index),
                    payload: self.core.payload(index).to_vec(),
                    retransmit: true,
                }
            })
            .collect();
        self.timer.arm(now);
        Ok(resend)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SenderState;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn sender(packets: usize, window: u32) -> GbnSender {
        let chunks = (0..packets).map(|i| vec![i as u8; 4]).collect();
        GbnSender::new(chunks, window, SeqSpace::new(20), TIMEOUT, 3)
    }

    fn fill(s: &mut GbnSender, now: Instant) -> Vec<u32> {
        std::iter::from_fn(|| s.next_new(now)).map(|o| o.seq).collect()
    }

    #[test]
    fn initial_state() {
        let s = sender(5, 4);
        assert_eq!(s.core().base(), 0);
        assert_eq!(s.core().next_to_send(), 0);
        assert!(s.core().can_send());
        assert!(!s.timer().is_armed());
        assert_eq!(s.core().state(), SenderState::Idle);
    }

    #[test]
    fn first_send_arms_timer() {
        let now = Instant::now();
        let mut s = sender(5, 4);
        assert_eq!(fill(&mut s, now), vec![1, 2, 3, 4]);
        assert!(s.timer().is_armed());
        assert!(!s.core().can_send());
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let now = Instant::now();
        let mut s = sender(5, 4);
        fill(&mut s, now);

        assert_eq!(s.on_ack(3, now), AckOutcome::Advanced(3));
        assert_eq!(s.core().base(), 3);
        assert_eq!(s.core().in_flight(), 1);
        assert!(s.timer().is_armed());
    }

    #[test]
    fn cumulative_ack_marks_whole_prefix() {
        // ACK of base+k implies base..=base+k, even when the earlier
        // individual ACKs were lost.
        let now = Instant::now();
        let mut s = sender(8, 4);
        fill(&mut s, now);
        let before = s.core().base();
        assert_eq!(s.on_ack(2, now), AckOutcome::Advanced(2));
        assert_eq!(s.core().base(), before + 2);
        for index in 0..2 {
            assert!(s.core().is_acked(index));
        }
    }

    #[test]
    fn repeated_ack_is_idempotent() {
        let now = Instant::now();
        let mut s = sender(5, 4);
        fill(&mut s, now);

        assert_eq!(s.on_ack(2, now), AckOutcome::Advanced(2));
        // The same ACK again names a packet behind the base now.
        assert_eq!(s.on_ack(2, now), AckOutcome::OutOfWindow);
        assert_eq!(s.core().base(), 2);
        // An older ACK must not move the base backward either.
        assert_eq!(s.on_ack(1, now), AckOutcome::OutOfWindow);
        assert_eq!(s.core().base(), 2);
    }

    #[test]
    fn ack_beyond_next_to_send_ignored() {
        let now = Instant::now();
        let mut s = sender(10, 4);
        fill(&mut s, now);
        assert_eq!(s.on_ack(9, now), AckOutcome::OutOfWindow);
        assert_eq!(s.core().base(), 0);
    }

    #[test]
    fn draining_window_disarms_timer() {
        let now = Instant::now();
        let mut s = sender(2, 4);
        fill(&mut s, now);
        assert_eq!(s.on_ack(2, now), AckOutcome::Advanced(2));
        assert!(!s.timer().is_armed());
        assert!(s.is_done());
    }

    #[test]
    fn timeout_retransmits_every_unacked_packet_once() {
        let now = Instant::now();
        let mut s = sender(10, 4);
        fill(&mut s, now);
        s.on_ack(1, now);

        assert!(s.poll_timeouts(now + TIMEOUT / 2).unwrap().is_empty());

        let resend = s.poll_timeouts(now + TIMEOUT).unwrap();
        let seqs: Vec<u32> = resend.iter().map(|o| o.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert!(resend.iter().all(|o| o.retransmit));

        // Rearmed: nothing more until another full timeout passes.
        assert!(s.poll_timeouts(now + TIMEOUT).unwrap().is_empty());
        assert_eq!(s.poll_timeouts(now + TIMEOUT * 2).unwrap().len(), 3);
    }

    #[test]
    fn stalled_sender_gives_up_after_max_retries() {
        let now = Instant::now();
        let mut s = sender(3, 4);
        fill(&mut s, now);
        let mut t = now;
        for _ in 0..3 {
            t += TIMEOUT;
            assert!(s.poll_timeouts(t).is_ok());
        }
        t += TIMEOUT;
        assert_eq!(
            s.poll_timeouts(t),
            Err(WindowError::RetriesExhausted {
                seq: 1,
                attempts: 4
            })
        );
    }

    #[test]
    fn progress_resets_retry_budget() {
        let now = Instant::now();
        let mut s = sender(6, 2);
        fill(&mut s, now);
        let mut t = now;
        for _ in 0..3 {
            t += TIMEOUT;
            s.poll_timeouts(t).unwrap();
        }
        assert_eq!(s.on_ack(1, t), AckOutcome::Advanced(1));
        for _ in 0..3 {
            t += TIMEOUT;
            assert!(s.poll_timeouts(t).is_ok());
        }
    }

    #[test]
    fn seq_wrap_around() {
        let now = Instant::now();
        let chunks = (0..12).map(|i| vec![i as u8]).collect();
        let mut s = GbnSender::new(chunks, 3, SeqSpace::new(5), TIMEOUT, 3);
        let mut delivered = 0u64;
        while !s.is_done() {
            let sent: Vec<Outgoing> = std::iter::from_fn(|| s.next_new(now)).collect();
            let last = sent.last().unwrap().seq;
            assert!(matches!(s.on_ack(last, now), AckOutcome::Advanced(_)));
            delivered += sent.len() as u64;
        }
        assert_eq!(delivered, 12);
    }
}
