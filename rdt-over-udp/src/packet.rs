//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged by the sliding-window engines is a [`Packet`].
//! This module is responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |     Flags     |   Sequence Number (hi 16)     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Sequence Number (lo 16)     |        Payload Length         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Window Hint          |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                 Timestamp (f64 seconds, 8 bytes)              |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |          Payload ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 18 bytes.
//! type(1) + flags(1) + seq(4) + payload_len(2) + window(2) + timestamp(8)

use thiserror::Error;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// This packet acknowledges the sequence number it carries.
    pub const ACK: u8 = 0b0000_0001;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 18;

/// Largest payload the 2-byte length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

// Byte offsets of each field within the serialised header.
const OFF_TYPE: usize = 0;
const OFF_FLAGS: usize = 1;
const OFF_SEQ: usize = 2;
const OFF_PAYLOAD_LEN: usize = 6;
const OFF_WINDOW: usize = 8;
const OFF_TIMESTAMP: usize = 10;

/// Packet type carried in the first header byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Data = 0,
    Ack = 1,
    Fin = 2,
    /// Control / transfer-start marker.
    Start = 3,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Ack),
            2 => Ok(PacketType::Fin),
            3 => Ok(PacketType::Start),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// A complete protocol datagram: header fields + payload bytes.
///
/// The payload length is not stored; it is always `payload.len()` and is
/// written into the header by [`Packet::encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub kind: PacketType,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    pub seq: u32,
    /// Advisory window size of the sending endpoint.
    pub window: u16,
    /// Seconds since the Unix epoch.
    ///
    /// `None` means "stamp at encode time"; decoded packets always carry
    /// `Some`.
    pub timestamp: Option<f64>,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A data packet carrying one file chunk.
    pub fn data(seq: u32, payload: Vec<u8>, window: u16) -> Self {
        Self {
            kind: PacketType::Data,
            flags: 0,
            seq,
            window,
            timestamp: None,
            payload,
        }
    }

    /// An acknowledgement for `seq`.
    pub fn ack(seq: u32, window: u16) -> Self {
        Self {
            kind: PacketType::Ack,
            flags: flags::ACK,
            seq,
            window,
            timestamp: None,
            payload: Vec::new(),
        }
    }

    /// End-of-stream marker.
    pub fn fin(seq: u32) -> Self {
        Self {
            kind: PacketType::Fin,
            flags: 0,
            seq,
            window: 0,
            timestamp: None,
            payload: b"FIN".to_vec(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.kind == PacketType::Ack || self.flags & flags::ACK != 0
    }

    pub fn is_data(&self) -> bool {
        self.kind == PacketType::Data && self.flags & flags::ACK == 0
    }

    pub fn is_fin(&self) -> bool {
        self.kind == PacketType::Fin
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// The payload-length field is computed from the actual payload. When
    /// `timestamp` is `None` the current wall-clock time is written.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let payload_len = self.payload.len();
        if payload_len > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(payload_len));
        }
        let timestamp = self.timestamp.unwrap_or_else(now_secs);

        let mut buf = vec![0u8; HEADER_LEN + payload_len];
        buf[OFF_TYPE] = self.kind as u8;
        buf[OFF_FLAGS] = self.flags;
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
            .copy_from_slice(&(payload_len as u16).to_be_bytes());
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&self.window.to_be_bytes());
        buf[OFF_TIMESTAMP..OFF_TIMESTAMP + 8].copy_from_slice(&timestamp.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the type byte is not a known [`PacketType`], or
    /// - the `payload_len` field claims more bytes than remain in `buf`.
    ///
    /// Bytes beyond the declared payload are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let kind = PacketType::try_from(buf[OFF_TYPE])?;
        let flags = buf[OFF_FLAGS];
        let seq = u32::from_be_bytes(be_array(&buf[OFF_SEQ..OFF_SEQ + 4]));
        let payload_len =
            u16::from_be_bytes(be_array(&buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2])) as usize;
        let window = u16::from_be_bytes(be_array(&buf[OFF_WINDOW..OFF_WINDOW + 2]));
        let timestamp = f64::from_be_bytes(be_array(&buf[OFF_TIMESTAMP..OFF_TIMESTAMP + 8]));

        let remaining = buf.len() - HEADER_LEN;
        if payload_len > remaining {
            return Err(PacketError::LengthMismatch {
                declared: payload_len,
                remaining,
            });
        }

        Ok(Packet {
            kind,
            flags,
            seq,
            window,
            timestamp: Some(timestamp),
            payload: buf[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        })
    }
}

/// Errors that can arise when building or parsing a datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too short to contain a header ({0} bytes)")]
    BufferTooShort(usize),
    #[error("payload_len field claims {declared} bytes but only {remaining} remain")]
    LengthMismatch { declared: usize, remaining: usize },
    #[error("unknown packet type {0}")]
    UnknownType(u8),
    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLarge(usize),
    #[error("sequence number {0} does not fit the legacy one-byte field")]
    SequenceTooLarge(u32),
    #[error("{0:?} packets cannot be expressed in the legacy format")]
    Unsupported(PacketType),
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Copy a fixed-size big-endian field out of an already length-checked slice.
fn be_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
