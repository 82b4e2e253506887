//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** packets are accepted (seq == `expected`).
//! - Out-of-order or duplicate packets are **discarded**, never buffered.
//! - Every arrival is answered with a **cumulative ACK** naming the last
//!   packet delivered in order. Before anything has been delivered there
//!   is nothing to acknowledge and no ACK is produced.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use crate::seq::SeqSpace;
use crate::state::ReceiverState;
use crate::window::{Disposition, RecvOutcome, RecvWindow};

/// Go-Back-N receive-side state for one file transfer.
#[derive(Debug)]
pub struct GbnReceiver {
    space: SeqSpace,
    /// Next wire sequence number that will be accepted.
    expected: u32,
    /// Last in-order sequence delivered; `None` until the first delivery.
    last_acked: Option<u32>,
    output: Vec<u8>,
    state: ReceiverState,
}

impl GbnReceiver {
    pub fn new(space: SeqSpace) -> Self {
        Self {
            space,
            expected: space.first(),
            last_acked: None,
            output: Vec::new(),
            state: ReceiverState::Listening,
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Cumulative ACK currently advertised.
    pub fn last_acked(&self) -> Option<u32> {
        self.last_acked
    }
}

impl RecvWindow for GbnReceiver {
    fn label(&self) -> &'static str {
        "gbn"
    }

    fn on_data(&mut self, seq: u32, payload: &[u8]) -> RecvOutcome {
        if seq == self.expected {
            self.output.extend_from_slice(payload);
            self.last_acked = Some(seq);
            self.expected = self.space.advance(seq);
            self.state = ReceiverState::Delivering;
            RecvOutcome {
                ack: Some(seq),
                disposition: Disposition::Delivered(1),
            }
        } else {
            // Out-of-order or duplicate: drop and repeat the last good ACK.
            RecvOutcome {
                ack: self.last_acked,
                disposition: Disposition::Discarded,
            }
        }
    }

    fn finish(&mut self) {
        self.state = ReceiverState::Stopped;
    }

    fn state(&self) -> ReceiverState {
        self.state
    }

    fn output(&self) -> &[u8] {
        &self.output
    }

    fn into_output(self) -> Vec<u8> {
        self.output
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
