//! Entry point for `rdt-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use rdt_over_udp::config::{Protocol, TransferConfig};
use rdt_over_udp::framing::Framing;
use rdt_over_udp::session::{Client, Server, DEFAULT_LOSS};
use rdt_over_udp::simulator::LossConfig;

/// Go-Back-N / Selective-Repeat file transfer over lossy UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve a file and accept uploads over it.
    Server {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:12340")]
        bind: SocketAddr,
        /// File sent on download and overwritten on upload.
        #[arg(short, long, default_value = "server.txt")]
        file: PathBuf,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Send one request to a server.
    Client {
        /// Remote server address.
        #[arg(short, long, default_value = "127.0.0.1:12340")]
        server: SocketAddr,
        /// File written on download and read on upload.
        #[arg(short, long, default_value = "client.txt")]
        file: PathBuf,
        #[command(flatten)]
        transfer: TransferArgs,
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Ask for the server's local time.
    Time,
    /// Stop the server.
    Quit,
    /// Fetch the server's file.
    Download(LossArgs),
    /// Send our file to the server.
    Upload(LossArgs),
}

#[derive(Args)]
struct LossArgs {
    /// Probability of dropping a data packet.
    #[arg(default_value_t = DEFAULT_LOSS)]
    data_loss: f64,
    /// Probability of dropping an acknowledgement.
    #[arg(default_value_t = DEFAULT_LOSS)]
    ack_loss: f64,
}

impl From<LossArgs> for LossConfig {
    fn from(a: LossArgs) -> Self {
        LossConfig::new(a.data_loss, a.ack_loss)
    }
}

/// Tunables shared by server and client; both ends must agree on them.
#[derive(Args)]
struct TransferArgs {
    /// Window protocol: gbn or sr.
    #[arg(short, long, default_value = "gbn")]
    protocol: Protocol,
    /// Packets in flight.
    #[arg(short, long, default_value_t = 4)]
    window: u32,
    /// Number of wire sequence numbers.
    #[arg(long, default_value_t = 20)]
    seq_space: u32,
    /// Payload bytes per packet.
    #[arg(long, default_value_t = 1024)]
    chunk: usize,
    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Use the one-byte sequence framing instead of the 18-byte header.
    #[arg(long)]
    legacy: bool,
    /// Seed for the loss simulator.
    #[arg(long)]
    seed: Option<u64>,
}

impl TransferArgs {
    fn config(&self) -> TransferConfig {
        TransferConfig {
            protocol: self.protocol,
            window_size: self.window,
            seq_space: self.seq_space,
            chunk_size: self.chunk,
            timeout: Duration::from_millis(self.timeout_ms),
            framing: if self.legacy {
                Framing::Legacy
            } else {
                Framing::Header
            },
            ..TransferConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            bind,
            file,
            transfer,
        } => {
            let server = Server::bind(bind, transfer.config(), file)
                .await
                .with_context(|| format!("cannot start server on {bind}"))?
                .with_seed(transfer.seed);
            server.serve().await?;
        }
        Mode::Client {
            server,
            file,
            transfer,
            action,
        } => {
            let client = Client::connect(server, transfer.config(), file)
                .await?
                .with_seed(transfer.seed);
            match action {
                Action::Time => println!("{}", client.time().await?),
                Action::Quit => println!("{}", client.quit().await?),
                Action::Download(loss) => {
                    let stats = client.download(loss.into()).await?;
                    println!("{stats}");
                }
                Action::Upload(loss) => {
                    let stats = client
                        .upload(loss.into())
                        .await
                        .with_context(|| format!("upload of {} failed", client.file().display()))?;
                    println!("{stats}");
                }
            }
        }
    }
    Ok(())
}
