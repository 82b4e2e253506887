//! Transfer configuration.
//!
//! [`TransferConfig`] gathers every tunable of a sliding-window transfer.
//! The defaults match the classic lab setup: a 20-value sequence space,
//! window of 4, 1 KiB chunks and a one-second retransmission timeout.
//! The CLI in `main.rs` maps its flags onto these fields.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::framing::Framing;

/// Largest accepted sequence space. Window engines keep one slot per wire
/// value, so this also bounds their memory.
pub const MAX_SEQ_SPACE: u32 = u16::MAX as u32;

/// Which retransmission strategy a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Cumulative ACKs, one timer, whole-window retransmission.
    #[default]
    GoBackN,
    /// Individual ACKs, per-packet timers, selective retransmission.
    SelectiveRepeat,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gbn" | "go-back-n" => Ok(Protocol::GoBackN),
            "sr" | "selective-repeat" => Ok(Protocol::SelectiveRepeat),
            _ => Err(ConfigError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::GoBackN => write!(f, "gbn"),
            Protocol::SelectiveRepeat => write!(f, "sr"),
        }
    }
}

/// Tunables shared by both ends of a transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub protocol: Protocol,
    /// Maximum packets in flight.
    pub window_size: u32,
    /// Number of distinct wire sequence numbers (`1..=seq_space`).
    pub seq_space: u32,
    /// Bytes of file data per packet.
    pub chunk_size: usize,
    /// Retransmission timeout (per window for GBN, per packet for SR).
    pub timeout: Duration,
    /// Bounded wait of every socket receive; also the scheduling tick.
    pub poll_interval: Duration,
    /// GBN: consecutive timeouts without progress. SR: transmissions of a
    /// single packet. Exceeding it aborts the transfer.
    pub max_retries: u32,
    /// A receiver that hears nothing for this long gives up.
    pub idle_timeout: Duration,
    /// How long a client waits for a control reply.
    pub reply_timeout: Duration,
    pub framing: Framing,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::GoBackN,
            window_size: 4,
            seq_space: 20,
            chunk_size: 1024,
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            max_retries: 20,
            idle_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(2),
            framing: Framing::Header,
        }
    }
}

impl TransferConfig {
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Check the invariants the window engines rely on.
    ///
    /// The window must be small enough that an ACK's forward distance from
    /// the base is unambiguous: `window < seq_space` for GBN and
    /// `2 * window <= seq_space` for SR. The space itself is limited to
    /// `2..=MAX_SEQ_SPACE`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_SEQ_SPACE).contains(&self.seq_space) {
            return Err(ConfigError::SeqSpace(self.seq_space));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Window {
                window: 0,
                seq_space: self.seq_space,
                protocol: self.protocol,
            });
        }
        let window_fits = match self.protocol {
            Protocol::GoBackN => self.window_size < self.seq_space,
            Protocol::SelectiveRepeat => self
                .window_size
                .checked_mul(2)
                .is_some_and(|w| w <= self.seq_space),
        };
        if !window_fits {
            return Err(ConfigError::Window {
                window: self.window_size,
                seq_space: self.seq_space,
                protocol: self.protocol,
            });
        }
        if self.chunk_size == 0 || self.chunk_size > self.framing.max_payload() {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.framing == Framing::Legacy && self.seq_space > u32::from(u8::MAX) {
            return Err(ConfigError::SeqSpace(self.seq_space));
        }
        if self.timeout.is_zero() || self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(())
    }

    /// Window size as advertised in packet headers.
    pub fn window_hint(&self) -> u16 {
        u16::try_from(self.window_size).unwrap_or(u16::MAX)
    }
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("window {window} does not fit a sequence space of {seq_space} for {protocol}")]
    Window {
        window: u32,
        seq_space: u32,
        protocol: Protocol,
    },
    #[error("invalid sequence space size {0}")]
    SeqSpace(u32),
    #[error("invalid chunk size {0}")]
    ChunkSize(usize),
    #[error("timeouts must be non-zero")]
    ZeroDuration,
    #[error("unknown protocol {0:?} (expected gbn or sr)")]
    UnknownProtocol(String),
}
