//! Datagram framing: the 18-byte header format or the legacy one-byte form.
//!
//! The legacy form carries no type field, so decoding needs to know which
//! side of the transfer is reading:
//!
//! ```text
//!  data:  [seq:1][payload <= 1024]
//!  ack:   [seq:1]
//!  fin:   "Transfer done"
//! ```

use crate::packet::{Packet, PacketError, PacketType};

/// Out-of-band end-of-stream marker used by the legacy framing.
pub const DONE_SENTINEL: &[u8] = b"Transfer done";

/// Largest payload a legacy data frame may carry.
pub const LEGACY_MAX_PAYLOAD: usize = 1024;

/// What the reading side expects to find in a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Receiver side: data packets or the end-of-stream marker.
    Data,
    /// Sender side: acknowledgements.
    Ack,
}

/// Wire representation used by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// [`crate::packet`] fixed header + payload.
    #[default]
    Header,
    /// `[seq:1][payload]` with the `"Transfer done"` sentinel.
    Legacy,
}

impl Framing {
    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, PacketError> {
        match self {
            Framing::Header => packet.encode(),
            Framing::Legacy => encode_legacy(packet),
        }
    }

    pub fn decode(&self, buf: &[u8], expect: Expect) -> Result<Packet, PacketError> {
        match self {
            Framing::Header => Packet::decode(buf),
            Framing::Legacy => decode_legacy(buf, expect),
        }
    }

    /// Largest chunk a data packet may carry under this framing.
    pub fn max_payload(&self) -> usize {
        match self {
            Framing::Header => crate::packet::MAX_PAYLOAD,
            Framing::Legacy => LEGACY_MAX_PAYLOAD,
        }
    }
}

fn encode_legacy(packet: &Packet) -> Result<Vec<u8>, PacketError> {
    if packet.is_fin() {
        return Ok(DONE_SENTINEL.to_vec());
    }
    let seq = u8::try_from(packet.seq).map_err(|_| PacketError::SequenceTooLarge(packet.seq))?;
    match packet.kind {
        PacketType::Ack => Ok(vec![seq]),
        PacketType::Data => {
            if packet.payload.len() > LEGACY_MAX_PAYLOAD {
                return Err(PacketError::PayloadTooLarge(packet.payload.len()));
            }
            let mut buf = Vec::with_capacity(1 + packet.payload.len());
            buf.push(seq);
            buf.extend_from_slice(&packet.payload);
            Ok(buf)
        }
        other => Err(PacketError::Unsupported(other)),
    }
}

fn decode_legacy(buf: &[u8], expect: Expect) -> Result<Packet, PacketError> {
    if buf.is_empty() {
        return Err(PacketError::BufferTooShort(0));
    }
    if buf == DONE_SENTINEL {
        return Ok(stamped(Packet::fin(0)));
    }
    let seq = u32::from(buf[0]);
    let packet = match expect {
        Expect::Ack => Packet::ack(seq, 0),
        Expect::Data => {
            if buf.len() - 1 > LEGACY_MAX_PAYLOAD {
                return Err(PacketError::PayloadTooLarge(buf.len() - 1));
            }
            Packet::data(seq, buf[1..].to_vec(), 0)
        }
    };
    Ok(stamped(packet))
}

fn stamped(mut packet: Packet) -> Packet {
    packet.timestamp = Some(crate::packet::now_secs());
    packet
}
