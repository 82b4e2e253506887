//! Transfer drivers: move one file across a lossy link with a window protocol.
//!
//! # Architecture
//!
//! ```text
//!              sending peer                              receiving peer
//!  ┌───────────────────────────────────┐
//!  │ send loop (single mutator)        │   DATA    ┌──────────────────────┐
//!  │   next_new / poll_timeouts ───────┼──[loss]──▶│ receive loop         │
//!  │   on_ack ◀── mpsc ◀──┐            │           │   RecvWindow::on_data│
//!  └──────────────────────┼────────────┘           │                      │
//!                  ┌──────┴────────┐      ACK      │                      │
//!                  │ ACK listener  │◀────[loss]────┤                      │
//!                  │ (spawned task)│               └──────────────────────┘
//!                  └───────────────┘
//! ```
//!
//! The listener only decodes datagrams and posts [`AckEvent`]s; all window
//! state is touched by the send loop alone. Once every packet is
//! acknowledged the send loop wakes the listener through a [`Notify`],
//! joins it, and only then puts the FIN on the wire. Whatever the peer
//! sends after the FIN (typically its next command) stays queued on the
//! socket for the caller.
//!
//! Both drivers are generic over [`SendWindow`] / [`RecvWindow`], so the
//! same loops carry Go-Back-N and Selective Repeat. [`send_bytes`] and
//! [`receive_bytes`] pick the variant from a [`TransferConfig`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;

use crate::config::{ConfigError, Protocol, TransferConfig};
use crate::framing::{Expect, Framing};
use crate::gbn_receiver::GbnReceiver;
use crate::gbn_sender::GbnSender;
use crate::packet::{Packet, PacketError};
use crate::seq::SeqSpace;
use crate::simulator::LossSimulator;
use crate::socket::{Socket, SocketError};
use crate::sr_receiver::SrReceiver;
use crate::sr_sender::SrSender;
use crate::stats::TransferStats;
use crate::window::{
    chunk, AckOutcome, Disposition, Outgoing, RecvWindow, SendWindow, WindowError,
};

const ACK_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("cannot frame packet: {0}")]
    Packet(#[from] PacketError),

    #[error("invalid transfer configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("packet seq={seq} unacknowledged after {attempts} attempts")]
    RetriesExhausted { seq: u32, attempts: u32 },

    #[error("nothing heard from peer for {0:?}")]
    Idle(Duration),

    #[error("ACK listener stopped unexpectedly")]
    ListenerClosed,
}

impl From<WindowError> for TransferError {
    fn from(e: WindowError) -> Self {
        match e {
            WindowError::RetriesExhausted { seq, attempts } => {
                Self::RetriesExhausted { seq, attempts }
            }
        }
    }
}

/// Message from the ACK listener to the send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEvent {
    Ack(u32),
    /// A datagram from the peer that did not decode as an ACK.
    Malformed,
}

// ---------------------------------------------------------------------------
// Protocol dispatch
// ---------------------------------------------------------------------------

/// Send `data` to `peer` with the protocol named in `config`.
pub async fn send_bytes(
    socket: Arc<Socket>,
    peer: SocketAddr,
    data: &[u8],
    config: &TransferConfig,
    loss: &mut LossSimulator,
) -> Result<TransferStats, TransferError> {
    config.validate()?;
    let chunks = chunk(data, config.chunk_size);
    let space = SeqSpace::new(config.seq_space);
    log::info!(
        "[{}] sending {} bytes in {} packet(s) to {} (data loss {})",
        config.protocol,
        data.len(),
        chunks.len(),
        peer,
        loss.config().data_loss
    );
    match config.protocol {
        Protocol::GoBackN => {
            let window = GbnSender::new(
                chunks,
                config.window_size,
                space,
                config.timeout,
                config.max_retries,
            );
            send_file(socket, peer, window, config, loss).await
        }
        Protocol::SelectiveRepeat => {
            let window = SrSender::new(
                chunks,
                config.window_size,
                space,
                config.timeout,
                config.max_retries,
            );
            send_file(socket, peer, window, config, loss).await
        }
    }
}

/// Receive a file from `peer` with the protocol named in `config`.
pub async fn receive_bytes(
    socket: &Socket,
    peer: SocketAddr,
    config: &TransferConfig,
    loss: &mut LossSimulator,
) -> Result<(Vec<u8>, TransferStats), TransferError> {
    config.validate()?;
    let space = SeqSpace::new(config.seq_space);
    log::info!(
        "[{}] receiving from {} (ACK loss {})",
        config.protocol,
        peer,
        loss.config().ack_loss
    );
    match config.protocol {
        Protocol::GoBackN => {
            receive_file(socket, peer, GbnReceiver::new(space), config, loss).await
        }
        Protocol::SelectiveRepeat => {
            let window = SrReceiver::new(space, config.window_size);
            receive_file(socket, peer, window, config, loss).await
        }
    }
}

// ---------------------------------------------------------------------------
// Sending side
// ---------------------------------------------------------------------------

/// Run a complete send: fill the window, react to ACKs and timeouts, then
/// announce end of stream.
///
/// The FIN (or legacy `"Transfer done"`) is sent once every packet has been
/// acknowledged and is not subject to simulated loss.
pub async fn send_file<W: SendWindow>(
    socket: Arc<Socket>,
    peer: SocketAddr,
    mut window: W,
    config: &TransferConfig,
    loss: &mut LossSimulator,
) -> Result<TransferStats, TransferError> {
    let shutdown = Arc::new(Notify::new());
    let (ack_tx, mut ack_rx) = mpsc::channel(ACK_CHANNEL_CAPACITY);
    let listener = tokio::spawn(ack_listener(
        Arc::clone(&socket),
        peer,
        config.framing,
        config.poll_interval,
        Arc::clone(&shutdown),
        ack_tx,
    ));

    let link = Link {
        socket: &socket,
        peer,
        framing: config.framing,
        window_hint: config.window_hint(),
        label: window.label(),
    };
    let mut stats = TransferStats::default();
    let outcome = run_sender(&link, &mut window, config, loss, &mut ack_rx, &mut stats).await;

    // `notify_one` stores a permit, so a listener busy forwarding an ACK
    // still sees it on its next wait.
    shutdown.notify_one();
    drop(ack_rx);
    let joined = listener.await.map_err(|_| TransferError::ListenerClosed)?;

    match (outcome, joined) {
        (Err(TransferError::ListenerClosed), Err(e)) => return Err(e.into()),
        (Err(e), _) => return Err(e),
        (Ok(()), Err(e)) => log::warn!("[{}] ACK listener ended with error: {e}", link.label),
        (Ok(()), Ok(())) => {}
    }

    let fin_seq = window.core().space().wire(window.core().total());
    let fin = link.framing.encode(&Packet::fin(fin_seq))?;
    link.socket.send_to(&fin, link.peer).await?;
    log::debug!("[{}] → FIN", link.label);
    log::info!("[{}] transfer complete: {stats}", link.label);
    Ok(stats)
}

/// Where outgoing datagrams go and how they are framed.
struct Link<'a> {
    socket: &'a Socket,
    peer: SocketAddr,
    framing: Framing,
    window_hint: u16,
    label: &'static str,
}

impl Link<'_> {
    /// Put one data packet on the wire, unless the loss gate eats it.
    async fn transmit(
        &self,
        out: Outgoing,
        loss: &mut LossSimulator,
        stats: &mut TransferStats,
    ) -> Result<(), TransferError> {
        stats.transmissions += 1;
        if out.retransmit {
            stats.retransmissions += 1;
        }
        if loss.drop_data() {
            stats.data_dropped += 1;
            log::debug!("[loss] dropped DATA seq={}", out.seq);
            return Ok(());
        }
        let len = out.payload.len();
        let bytes = self
            .framing
            .encode(&Packet::data(out.seq, out.payload, self.window_hint))?;
        self.socket.send_to(&bytes, self.peer).await?;
        log::debug!(
            "[{}] → DATA seq={} len={}{}",
            self.label,
            out.seq,
            len,
            if out.retransmit { " (retransmit)" } else { "" }
        );
        Ok(())
    }
}

async fn run_sender<W: SendWindow>(
    link: &Link<'_>,
    window: &mut W,
    config: &TransferConfig,
    loss: &mut LossSimulator,
    ack_rx: &mut mpsc::Receiver<AckEvent>,
    stats: &mut TransferStats,
) -> Result<(), TransferError> {
    let core = window.core();
    stats.packets = core.total();
    stats.bytes = (0..core.total()).map(|i| core.payload(i).len() as u64).sum();

    let mut tick = tokio::time::interval(config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let now = Instant::now();
        while let Some(out) = window.next_new(now) {
            link.transmit(out, loss, stats).await?;
        }
        if window.is_done() {
            break;
        }

        tokio::select! {
            // ── ACK from the listener ────────────────────────────────────
            event = ack_rx.recv() => match event {
                Some(AckEvent::Ack(seq)) => {
                    stats.acks_received += 1;
                    match window.on_ack(seq, Instant::now()) {
                        AckOutcome::Advanced(n) => log::debug!(
                            "[{}] ← ACK seq={} (slid {} pkt, base={})",
                            link.label,
                            seq,
                            n,
                            window.core().base()
                        ),
                        AckOutcome::Marked => {
                            log::debug!("[{}] ← ACK seq={} (out of order)", link.label, seq)
                        }
                        AckOutcome::Duplicate | AckOutcome::OutOfWindow => {
                            stats.duplicate_acks += 1;
                            log::debug!("[{}] ← ACK seq={} ignored", link.label, seq);
                        }
                    }
                }
                Some(AckEvent::Malformed) => stats.malformed += 1,
                None => return Err(TransferError::ListenerClosed),
            },

            // ── Scheduling tick: retransmission check ────────────────────
            _ = tick.tick() => {
                let resend = window.poll_timeouts(Instant::now())?;
                if !resend.is_empty() {
                    stats.timeouts += 1;
                    log::debug!(
                        "[{}] timeout, retransmitting {} pkt(s)",
                        link.label,
                        resend.len()
                    );
                    for out in resend {
                        link.transmit(out, loss, stats).await?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Read ACKs from `peer` until `shutdown` fires or the send loop goes away.
///
/// The receive is raced against the shutdown signal; a receive that loses
/// the race consumes nothing from the socket.
async fn ack_listener(
    socket: Arc<Socket>,
    peer: SocketAddr,
    framing: Framing,
    poll: Duration,
    shutdown: Arc<Notify>,
    tx: mpsc::Sender<AckEvent>,
) -> Result<(), SocketError> {
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            received = socket.recv_from_timeout(poll) => received?,
        };
        let Some((bytes, addr)) = received else {
            continue;
        };
        if addr != peer {
            log::debug!("[ack] ignoring datagram from {addr}");
            continue;
        }
        let event = match framing.decode(&bytes, Expect::Ack) {
            Ok(packet) if packet.is_ack() => AckEvent::Ack(packet.seq),
            Ok(packet) => {
                log::debug!("[ack] ignoring {:?} packet", packet.kind);
                continue;
            }
            Err(e) => {
                log::warn!("[ack] malformed datagram ({} bytes): {e}", bytes.len());
                AckEvent::Malformed
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Receiving side
// ---------------------------------------------------------------------------

/// Run a complete receive and return the reassembled bytes.
///
/// Ends on FIN. Gives up with [`TransferError::Idle`] once nothing has been
/// heard from `peer` for `config.idle_timeout`.
pub async fn receive_file<R: RecvWindow>(
    socket: &Socket,
    peer: SocketAddr,
    mut window: R,
    config: &TransferConfig,
    loss: &mut LossSimulator,
) -> Result<(Vec<u8>, TransferStats), TransferError> {
    let framing = config.framing;
    let label = window.label();
    let mut stats = TransferStats::default();
    let mut last_heard = Instant::now();

    loop {
        let Some((bytes, addr)) = socket.recv_from_timeout(config.poll_interval).await? else {
            if last_heard.elapsed() >= config.idle_timeout {
                log::warn!("[recv] peer {peer} silent for {:?}; giving up", config.idle_timeout);
                return Err(TransferError::Idle(config.idle_timeout));
            }
            continue;
        };
        if addr != peer {
            log::debug!("[recv] ignoring datagram from {addr}");
            continue;
        }
        last_heard = Instant::now();

        let packet = match framing.decode(&bytes, Expect::Data) {
            Ok(packet) => packet,
            Err(e) => {
                stats.malformed += 1;
                log::warn!("[recv] malformed datagram ({} bytes): {e}", bytes.len());
                continue;
            }
        };
        if packet.is_fin() {
            window.finish();
            log::debug!("[{label}] ← FIN");
            break;
        }
        if !packet.is_data() {
            log::debug!("[recv] ignoring {:?} packet", packet.kind);
            continue;
        }

        stats.data_received += 1;
        let outcome = window.on_data(packet.seq, &packet.payload);
        match outcome.disposition {
            Disposition::Delivered(n) => stats.delivered += n as u64,
            Disposition::Buffered => stats.buffered += 1,
            Disposition::Duplicate | Disposition::Discarded => stats.discarded += 1,
        }
        log::debug!(
            "[{label}] ← DATA seq={} len={} {:?}",
            packet.seq,
            packet.payload.len(),
            outcome.disposition
        );

        let Some(ack) = outcome.ack else {
            continue;
        };
        if loss.drop_ack() {
            stats.acks_dropped += 1;
            log::debug!("[loss] dropped ACK seq={ack}");
            continue;
        }
        let bytes = framing.encode(&Packet::ack(ack, config.window_hint()))?;
        socket.send_to(&bytes, peer).await?;
        stats.acks_sent += 1;
        log::debug!("[{label}] → ACK seq={ack}");
    }

    let output = window.into_output();
    stats.packets = stats.delivered;
    stats.bytes = output.len() as u64;
    log::info!("[{label}] received {} bytes: {stats}", output.len());
    Ok((output, stats))
}
