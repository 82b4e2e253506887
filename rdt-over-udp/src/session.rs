//! Control plane: a file server and its client over one UDP socket each.
//!
//! A client talks to the server with short text commands:
//!
//! | Command            | Server action                                   |
//! |--------------------|-------------------------------------------------|
//! | `-time`            | reply with the local time                       |
//! | `-quit`            | reply `bye` and stop serving                    |
//! | `-dl <pd> <pa>`    | send its file to the client                     |
//! | `-up <pd> <pa>`    | receive the client's file and store it          |
//!
//! `pd` / `pa` are the simulated data / ACK loss probabilities for that
//! transfer; both ends build their own [`LossSimulator`] from them. A
//! transfer runs on the same socket as the commands, so the server handles
//! one request at a time.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigError, TransferConfig};
use crate::simulator::{LossConfig, LossSimulator};
use crate::socket::{Socket, SocketError};
use crate::stats::TransferStats;
use crate::transfer::{self, TransferError};

/// Loss rates assumed when a transfer command omits them.
pub const DEFAULT_LOSS: f64 = 0.2;

/// Format of the `-time` reply.
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub const BYE: &str = "bye";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command: {0:?}")]
    BadCommand(String),

    #[error("no reply from server within {0:?}")]
    NoReply(Duration),
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Time,
    Quit,
    /// Server sends its file to the client.
    Download(LossConfig),
    /// Client sends its file to the server.
    Upload(LossConfig),
}

impl FromStr for Command {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let bad = || SessionError::BadCommand(s.to_string());
        let command = match words.next().ok_or_else(bad)? {
            "-time" => Command::Time,
            "-quit" => Command::Quit,
            "-dl" => Command::Download(parse_rates(&mut words).ok_or_else(bad)?),
            "-up" => Command::Upload(parse_rates(&mut words).ok_or_else(bad)?),
            _ => return Err(bad()),
        };
        if words.next().is_some() {
            return Err(bad());
        }
        if let Command::Download(loss) | Command::Upload(loss) = &command {
            loss.validate()?;
        }
        Ok(command)
    }
}

impl Command {
    /// `true` if `reply` is what the server answers to this command.
    pub fn is_reply(&self, reply: &str) -> bool {
        match self {
            Command::Time => chrono::NaiveDateTime::parse_from_str(reply, TIME_FORMAT).is_ok(),
            Command::Quit => reply == BYE,
            Command::Download(_) | Command::Upload(_) => false,
        }
    }
}

fn parse_rates<'a>(words: &mut impl Iterator<Item = &'a str>) -> Option<LossConfig> {
    let mut next = || match words.next() {
        Some(w) => w.parse::<f64>().ok(),
        None => Some(DEFAULT_LOSS),
    };
    let data_loss = next()?;
    let ack_loss = next()?;
    Some(LossConfig::new(data_loss, ack_loss))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Time => write!(f, "-time"),
            Command::Quit => write!(f, "-quit"),
            Command::Download(l) => write!(f, "-dl {} {}", l.data_loss, l.ack_loss),
            Command::Upload(l) => write!(f, "-up {} {}", l.data_loss, l.ack_loss),
        }
    }
}

/// Local wall-clock time in the `-time` reply format.
pub fn local_time() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

fn with_seed(loss: LossConfig, seed: Option<u64>) -> LossConfig {
    match seed {
        Some(seed) => loss.with_seed(seed),
        None => loss,
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Serves one file and stores uploads over it.
#[derive(Debug)]
pub struct Server {
    socket: Arc<Socket>,
    config: TransferConfig,
    file: PathBuf,
    seed: Option<u64>,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        config: TransferConfig,
        file: impl Into<PathBuf>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let socket = Socket::bind(addr).await?;
        log::info!(
            "[session] server listening on {} ({}, window={})",
            socket.local_addr,
            config.protocol,
            config.window_size
        );
        Ok(Self {
            socket: Arc::new(socket),
            config,
            file: file.into(),
            seed: None,
        })
    }

    /// Seed every loss simulator this server builds.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Handle requests until a client sends `-quit`.
    ///
    /// A failed transfer is logged and the server keeps serving.
    pub async fn serve(&self) -> Result<(), SessionError> {
        loop {
            let Some((bytes, client)) = self
                .socket
                .recv_from_timeout(self.config.idle_timeout)
                .await?
            else {
                continue;
            };
            let Ok(text) = std::str::from_utf8(&bytes) else {
                log::debug!("[session] ignoring {} binary bytes from {client}", bytes.len());
                continue;
            };
            let command = match text.trim().parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    log::warn!("[session] {client}: {e}");
                    continue;
                }
            };
            log::info!("[session] {client} → {command}");

            match command {
                Command::Time => self.reply(&local_time(), client).await?,
                Command::Quit => {
                    self.reply(BYE, client).await?;
                    log::info!("[session] quit requested by {client}; shutting down");
                    return Ok(());
                }
                Command::Download(loss) => match self.send_to_client(client, loss).await {
                    Ok(stats) => log::info!("[session] download to {client} done: {stats}"),
                    Err(e) => log::warn!("[session] download to {client} failed: {e}"),
                },
                Command::Upload(loss) => match self.receive_from_client(client, loss).await {
                    Ok(stats) => log::info!("[session] upload from {client} done: {stats}"),
                    Err(e) => log::warn!("[session] upload from {client} failed: {e}"),
                },
            }
        }
    }

    async fn reply(&self, text: &str, client: SocketAddr) -> Result<(), SessionError> {
        self.socket.send_to(text.as_bytes(), client).await?;
        log::debug!("[session] → {client}: {text}");
        Ok(())
    }

    async fn send_to_client(
        &self,
        client: SocketAddr,
        loss: LossConfig,
    ) -> Result<TransferStats, SessionError> {
        let data = tokio::fs::read(&self.file).await?;
        let mut sim = LossSimulator::new(with_seed(loss, self.seed));
        let stats =
            transfer::send_bytes(Arc::clone(&self.socket), client, &data, &self.config, &mut sim)
                .await?;
        Ok(stats)
    }

    async fn receive_from_client(
        &self,
        client: SocketAddr,
        loss: LossConfig,
    ) -> Result<TransferStats, SessionError> {
        let mut sim = LossSimulator::new(with_seed(loss, self.seed));
        let (data, stats) =
            transfer::receive_bytes(&self.socket, client, &self.config, &mut sim).await?;
        tokio::fs::write(&self.file, &data).await?;
        log::info!("[session] stored {} bytes in {}", data.len(), self.file.display());
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Talks to a [`Server`]; downloads overwrite `file`, uploads read it.
#[derive(Debug)]
pub struct Client {
    socket: Arc<Socket>,
    server: SocketAddr,
    config: TransferConfig,
    file: PathBuf,
    seed: Option<u64>,
}

impl Client {
    pub async fn connect(
        server: SocketAddr,
        config: TransferConfig,
        file: impl Into<PathBuf>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let bind: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = Socket::bind(bind).await?;
        log::debug!("[session] client bound to {}", socket.local_addr);
        Ok(Self {
            socket: Arc::new(socket),
            server,
            config,
            file: file.into(),
            seed: None,
        })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Ask the server for its local time.
    pub async fn time(&self) -> Result<String, SessionError> {
        self.request(Command::Time).await
    }

    /// Ask the server to stop; returns its farewell.
    pub async fn quit(&self) -> Result<String, SessionError> {
        self.request(Command::Quit).await
    }

    /// Fetch the server's file into `self.file`.
    pub async fn download(&self, loss: LossConfig) -> Result<TransferStats, SessionError> {
        loss.validate()?;
        self.send_command(Command::Download(loss)).await?;
        let mut sim = LossSimulator::new(with_seed(loss, self.seed));
        let (data, stats) =
            transfer::receive_bytes(&self.socket, self.server, &self.config, &mut sim).await?;
        tokio::fs::write(&self.file, &data).await?;
        log::info!("[session] downloaded {} bytes into {}", data.len(), self.file.display());
        Ok(stats)
    }

    /// Send `self.file` to the server.
    ///
    /// A missing file is reported before anything is sent, so the server
    /// is never left waiting for an upload.
    pub async fn upload(&self, loss: LossConfig) -> Result<TransferStats, SessionError> {
        loss.validate()?;
        let data = tokio::fs::read(&self.file).await?;
        self.send_command(Command::Upload(loss)).await?;
        let mut sim = LossSimulator::new(with_seed(loss, self.seed));
        let stats = transfer::send_bytes(
            Arc::clone(&self.socket),
            self.server,
            &data,
            &self.config,
            &mut sim,
        )
        .await?;
        Ok(stats)
    }

    async fn send_command(&self, command: Command) -> Result<(), SessionError> {
        let stale = self.socket.drain();
        if stale > 0 {
            log::debug!("[session] discarded {stale} stale datagram(s)");
        }
        self.transmit(command).await
    }

    async fn transmit(&self, command: Command) -> Result<(), SessionError> {
        self.socket
            .send_to(command.to_string().as_bytes(), self.server)
            .await?;
        log::debug!("[session] → {}: {command}", self.server);
        Ok(())
    }

    /// Send `command` and wait for a text reply from the server.
    ///
    /// The command is repeated every retransmission timeout until a
    /// matching reply arrives or `reply_timeout` runs out. `-time` is
    /// idempotent and a server that has quit ignores further copies.
    async fn request(&self, command: Command) -> Result<String, SessionError> {
        self.send_command(command).await?;
        let wait = self.config.reply_timeout;
        let now = tokio::time::Instant::now();
        let deadline = now + wait;
        let mut resend_at = now + self.config.timeout;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(SessionError::NoReply(wait));
            }
            if now >= resend_at {
                log::debug!("[session] no reply to {command} yet; resending");
                self.transmit(command).await?;
                resend_at = now + self.config.timeout;
            }
            let left = deadline.min(resend_at).saturating_duration_since(now);
            let Some((bytes, addr)) = self.socket.recv_from_timeout(left).await? else {
                continue;
            };
            if addr != self.server {
                continue;
            }
            // Late ACKs from a finished transfer can still trickle in.
            match std::str::from_utf8(&bytes) {
                Ok(reply) if command.is_reply(reply) => {
                    log::debug!("[session] ← {addr}: {reply}");
                    return Ok(reply.to_string());
                }
                _ => log::debug!("[session] skipping {} stray bytes from {addr}", bytes.len()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!("-time".parse::<Command>().unwrap(), Command::Time);
        assert_eq!(" -quit \n".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn parses_transfer_rates() {
        assert_eq!(
            "-dl 0.1 0.3".parse::<Command>().unwrap(),
            Command::Download(LossConfig::new(0.1, 0.3))
        );
        assert_eq!(
            "-up 0 1".parse::<Command>().unwrap(),
            Command::Upload(LossConfig::new(0.0, 1.0))
        );
    }

    #[test]
    fn missing_rates_use_defaults() {
        assert_eq!(
            "-dl".parse::<Command>().unwrap(),
            Command::Download(LossConfig::new(DEFAULT_LOSS, DEFAULT_LOSS))
        );
        assert_eq!(
            "-up 0.5".parse::<Command>().unwrap(),
            Command::Upload(LossConfig::new(0.5, DEFAULT_LOSS))
        );
    }

    #[test]
    fn rejects_bad_input() {
        for input in ["", "-ls", "-dl x 0.2", "-dl 1.5 0.2", "-up 0.1 -0.1", "-time now", "-dl 0 0 0"] {
            assert!(input.parse::<Command>().is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        for cmd in [
            Command::Time,
            Command::Quit,
            Command::Download(LossConfig::new(0.25, 0.5)),
            Command::Upload(LossConfig::new(0.0, 0.0)),
        ] {
            assert_eq!(cmd.to_string().parse::<Command>().unwrap(), cmd);
        }
    }

    #[test]
    fn time_reply_matches_format() {
        let t = local_time();
        assert!(Command::Time.is_reply(&t), "{t}");
        assert!(!Command::Time.is_reply("\u{1}"));
        assert!(Command::Quit.is_reply(BYE));
        assert!(!Command::Quit.is_reply(&t));
    }
}
