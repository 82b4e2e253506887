//! Selective-Repeat receive-side state machine.
//!
//! Unlike Go-Back-N, an SR receiver keeps packets that arrive ahead of a
//! gap and acknowledges each packet individually:
//!
//! ```text
//!   expected - W        expected            expected + W
//!        │                 │                     │
//!   ─────┼─────────────────┼─────────────────────┼────▶ seq
//!        │  already seen:  │  receive window:    │
//!        │  re-ACK only    │  deliver / buffer   │  ignore
//! ```
//!
//! A packet from the previous window was delivered but its ACK may have
//! been lost, so it is acknowledged again without being delivered twice.

use std::collections::HashMap;

use crate::seq::SeqSpace;
use crate::state::ReceiverState;
use crate::window::{Disposition, RecvOutcome, RecvWindow};

/// Selective-Repeat receive-side state for one file transfer.
#[derive(Debug)]
pub struct SrReceiver {
    space: SeqSpace,
    window_size: u32,
    expected: u32,
    /// Out-of-order payloads strictly ahead of `expected`, inside the window.
    reorder: HashMap<u32, Vec<u8>>,
    output: Vec<u8>,
    state: ReceiverState,
}

impl SrReceiver {
    pub fn new(space: SeqSpace, window_size: u32) -> Self {
        assert!(
            window_size * 2 <= space.modulus(),
            "SR window must be at most half the sequence space"
        );
        Self {
            space,
            window_size,
            expected: space.first(),
            reorder: HashMap::new(),
            output: Vec::new(),
            state: ReceiverState::Listening,
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn buffered(&self) -> usize {
        self.reorder.len()
    }

    fn deliver_in_order(&mut self, payload: &[u8]) -> usize {
        self.output.extend_from_slice(payload);
        self.expected = self.space.advance(self.expected);
        let mut delivered = 1;
        while let Some(next) = self.reorder.remove(&self.expected) {
            self.output.extend_from_slice(&next);
            self.expected = self.space.advance(self.expected);
            delivered += 1;
        }
        self.state = ReceiverState::Delivering;
        delivered
    }
}

impl RecvWindow for SrReceiver {
    fn label(&self) -> &'static str {
        "sr"
    }

    fn on_data(&mut self, seq: u32, payload: &[u8]) -> RecvOutcome {
        let disposition = if seq == self.expected {
            Disposition::Delivered(self.deliver_in_order(payload))
        } else if self.space.in_window(seq, self.expected, self.window_size) {
            if self.reorder.contains_key(&seq) {
                Disposition::Duplicate
            } else {
                self.reorder.insert(seq, payload.to_vec());
                Disposition::Buffered
            }
        } else {
            let previous = self.space.retreat(self.expected, self.window_size);
            if self.space.in_window(seq, previous, self.window_size) {
                Disposition::Duplicate
            } else {
                return RecvOutcome {
                    ack: None,
                    disposition: Disposition::Discarded,
                };
            }
        };
        RecvOutcome {
            ack: Some(seq),
            disposition,
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
