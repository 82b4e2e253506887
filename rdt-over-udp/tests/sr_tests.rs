//! Integration tests for Selective-Repeat transfers over loopback.

use std::sync::Arc;
use std::time::Duration;

use rdt_over_udp::{
    config::{Protocol, TransferConfig},
    packet::Packet,
    simulator::{LossConfig, LossSimulator},
    socket::Socket,
    stats::TransferStats,
    transfer::{receive_bytes, send_bytes},
};

async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn sr_config() -> TransferConfig {
    TransferConfig {
        protocol: Protocol::SelectiveRepeat,
        timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(5),
        max_retries: 100,
        idle_timeout: Duration::from_secs(5),
        ..TransferConfig::default()
    }
}

fn file_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

async fn transfer(
    data: Vec<u8>,
    config: TransferConfig,
    data_loss: LossConfig,
    ack_loss: LossConfig,
) -> (Vec<u8>, TransferStats, TransferStats) {
    let _ = env_logger::try_init();

    let tx_sock = ephemeral().await;
    let rx_sock = ephemeral().await;
    let tx_addr = tx_sock.local_addr;
    let rx_addr = rx_sock.local_addr;

    let rx_config = config.clone();
    let receiver = tokio::spawn(async move {
        let mut sim = LossSimulator::new(ack_loss);
        receive_bytes(&rx_sock, tx_addr, &rx_config, &mut sim)
            .await
            .expect("receive")
    });
    let sender = tokio::spawn(async move {
        let mut sim = LossSimulator::new(data_loss);
        send_bytes(Arc::new(tx_sock), rx_addr, &data, &config, &mut sim)
            .await
            .expect("send")
    });

    let (rr, sr) = tokio::join!(receiver, sender);
    let (received, rx_stats) = rr.unwrap();
    (received, sr.unwrap(), rx_stats)
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sr_5000_bytes_with_data_loss() {
    let data = file_bytes(5000);
    let (received, tx, _) = transfer(
        data.clone(),
        sr_config(),
        LossConfig::new(0.3, 0.0).with_seed(2024),
        LossConfig::default(),
    )
    .await;

    assert_eq!(received, data);
    assert_eq!(tx.packets, 5);
    // Every dropped transmission has to be sent again.
    assert!(tx.retransmissions >= tx.data_dropped);
}

#[tokio::test]
async fn test_sr_loss_both_directions_with_wraparound() {
    let data = file_bytes(30_000);
    let config = TransferConfig {
        window_size: 4,
        seq_space: 8,
        chunk_size: 500,
        ..sr_config()
    };
    let (received, tx, rx) = transfer(
        data.clone(),
        config,
        LossConfig::new(0.25, 0.0).with_seed(5),
        LossConfig::new(0.0, 0.25).with_seed(6),
    )
    .await;

    assert_eq!(received, data);
    assert_eq!(tx.packets, 60);
    assert_eq!(rx.delivered, 60);
}

#[tokio::test]
async fn test_sr_no_loss_sends_each_packet_once() {
    let data = file_bytes(8192);
    let config = TransferConfig {
        timeout: Duration::from_secs(1),
        ..sr_config()
    };
    let (received, tx, rx) =
        transfer(data.clone(), config, LossConfig::default(), LossConfig::default()).await;

    assert_eq!(received, data);
    assert_eq!(tx.transmissions, 8);
    assert_eq!(tx.retransmissions, 0);
    assert_eq!(rx.acks_sent, 8);
}

// ---------------------------------------------------------------------------
// Receiver behaviour against a hand-driven peer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sr_receiver_reorders_and_acks_individually() {
    let _ = env_logger::try_init();

    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();

    let receiver = tokio::spawn(async move {
        let mut sim = LossSimulator::lossless();
        receive_bytes(&rx_sock, peer_addr, &sr_config(), &mut sim)
            .await
            .expect("receive")
    });

    let mut acks = Vec::new();
    // 1 is sent twice: the second copy stands in for a retransmission
    // after a lost ACK.
    for (seq, payload) in [(2u32, "2"), (1, "1"), (3, "3"), (1, "1")] {
        let bytes = Packet::data(seq, payload.as_bytes().to_vec(), 4).encode().unwrap();
        peer.send_to(&bytes, rx_addr).await.unwrap();

        let mut buf = [0u8; 128];
        let (n, _) = tokio::time::timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
            .await
            .expect("ACK in time")
            .unwrap();
        acks.push(Packet::decode(&buf[..n]).unwrap().seq);
    }
    peer.send_to(&Packet::fin(4).encode().unwrap(), rx_addr)
        .await
        .unwrap();

    let (output, stats) = receiver.await.unwrap();
    assert_eq!(acks, vec![2, 1, 3, 1]);
    assert_eq!(output, b"123");
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.discarded, 1);
}

#[tokio::test]
async fn test_malformed_datagrams_are_skipped() {
    let _ = env_logger::try_init();

    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();

    let receiver = tokio::spawn(async move {
        let mut sim = LossSimulator::lossless();
        receive_bytes(&rx_sock, peer_addr, &sr_config(), &mut sim)
            .await
            .expect("receive")
    });

    peer.send_to(b"garbage", rx_addr).await.unwrap();
    peer.send_to(&[9u8; 40], rx_addr).await.unwrap();
    let data = Packet::data(1, b"ok".to_vec(), 4).encode().unwrap();
    peer.send_to(&data, rx_addr).await.unwrap();
    peer.send_to(&Packet::fin(2).encode().unwrap(), rx_addr)
        .await
        .unwrap();

    let (output, stats) = receiver.await.unwrap();
    assert_eq!(output, b"ok");
    assert_eq!(stats.malformed, 2);
}
