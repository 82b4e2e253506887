//! `rdt-over-udp`: reliable file transfer over lossy UDP with Go-Back-N
//! and Selective-Repeat sliding windows.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  -time/-quit/-dl/-up  ┌──────────────┐
//!  │ session      │──────────────────────▶│ session      │
//!  │   Client     │                       │   Server     │
//!  └──────┬───────┘                       └──────┬───────┘
//!         │ send_bytes / receive_bytes           │
//!  ┌──────▼───────────────────────────────────────▼──────┐
//!  │ transfer  (send loop + ACK listener, receive loop)  │
//!  │    generic over SendWindow / RecvWindow             │
//!  └──────┬───────────────────────┬──────────────────────┘
//!         │ GBN / SR state        │ framed datagrams
//!  ┌──────▼───────┐        ┌──────▼──────┐   ┌───────────┐
//!  │ window       │        │ framing     │   │ simulator │
//!  │ gbn_* / sr_* │        │ packet      │   │ (loss)    │
//!  └──────────────┘        └──────┬──────┘   └───────────┘
//!                          ┌──────▼──────┐
//!                          │ socket      │  (tokio UdpSocket)
//!                          └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]        : 18-byte header wire format
//! - [`framing`]       : header or legacy one-byte framing
//! - [`seq`]           : cyclic sequence-number arithmetic
//! - [`window`]        : shared sender window and the variant traits
//! - [`gbn_sender`]    : Go-Back-N cumulative-ACK sender
//! - [`gbn_receiver`]  : Go-Back-N in-order receiver
//! - [`sr_sender`]     : Selective-Repeat per-packet-timer sender
//! - [`sr_receiver`]   : Selective-Repeat reordering receiver
//! - [`timer`]         : retransmission deadlines
//! - [`state`]         : sender / receiver lifecycle states
//! - [`simulator`]     : per-endpoint packet and ACK loss
//! - [`socket`]        : async UDP socket abstraction
//! - [`transfer`]      : I/O drivers for one file transfer
//! - [`stats`]         : per-transfer counters
//! - [`config`]        : transfer tunables and validation
//! - [`session`]       : command protocol, server and client

pub mod config;
pub mod framing;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod seq;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod sr_receiver;
pub mod sr_sender;
pub mod state;
pub mod stats;
pub mod timer;
pub mod transfer;
pub mod window;
