//! Finite-state-machine types for the window engines.
//!
//! Transitions are driven by [`crate::window::WindowCore`] (senders) and by
//! the receivers themselves; this module only names the states so both
//! protocol variants report them the same way.

/// Sender lifecycle for one file transfer.
///
/// ```text
///  IDLE ──first packet──▶ SENDING ──last packet sent──▶ DRAINING ──all acked──▶ DONE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Nothing transmitted yet.
    #[default]
    Idle,
    /// New packets remain to be sent.
    Sending,
    /// Every packet has been sent at least once; waiting for ACKs.
    Draining,
    /// Every packet acknowledged.
    Done,
}

/// Receiver lifecycle for one file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// Waiting for the first in-order packet.
    #[default]
    Listening,
    /// At least one packet delivered to the output.
    Delivering,
    /// End-of-stream seen; output is final.
    Stopped,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
