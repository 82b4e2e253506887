//! Transfer statistics, counted by the send/receive loop that owns a
//! transfer and returned to the caller when it finishes.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Total number of data packets in the file.
    pub packets: u64,
    /// Data packet transmissions, including retransmissions and packets the
    /// loss simulator dropped.
    pub transmissions: u64,
    /// Retransmitted data packets.
    pub retransmissions: u64,
    /// Timer expiries that triggered a retransmission.
    pub timeouts: u64,
    /// Data packets dropped by the loss simulator.
    pub data_dropped: u64,
    /// ACKs that reached the sender.
    pub acks_received: u64,
    /// ACKs that did not advance or mark anything.
    pub duplicate_acks: u64,
    /// Data packets that reached the receiver.
    pub data_received: u64,
    /// Packets appended to the output in order.
    pub delivered: u64,
    /// Packets parked in the SR reorder buffer.
    pub buffered: u64,
    /// Packets thrown away by the receiver (out of order for GBN, outside
    /// the window for SR).
    pub discarded: u64,
    /// ACKs the receiver attempted to send.
    pub acks_sent: u64,
    /// ACKs dropped by the loss simulator.
    pub acks_dropped: u64,
    /// Datagrams that failed to decode.
    pub malformed: u64,
    /// Payload bytes delivered (receiver) or offered (sender).
    pub bytes: u64,
}

impl TransferStats {
    /// Fraction of transmissions that were first sends.
    pub fn efficiency(&self) -> f64 {
        if self.transmissions == 0 {
            return 1.0;
        }
        (self.transmissions - self.retransmissions) as f64 / self.transmissions as f64
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets={} bytes={} sent={} retrans={} timeouts={} dropped={} \
             acks_in={} dup_acks={} recv={} delivered={} buffered={} discarded={} \
             acks_out={} acks_dropped={} malformed={}",
            self.packets,
            self.bytes,
            self.transmissions,
            self.retransmissions,
            self.timeouts,
            self.data_dropped,
            self.acks_received,
            self.duplicate_acks,
            self.data_received,
            self.delivered,
            self.buffered,
            self.discarded,
            self.acks_sent,
            self.acks_dropped,
            self.malformed,
        )
    }
}
