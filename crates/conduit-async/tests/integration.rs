//! Integration tests for conduit-async.

use conduit_async::{channel, StreamConfig, StreamExt};
use conduit_ring::Config;
use futures::SinkExt;
use std::time::Duration;

#[tokio::test]
async fn basic_send_receive() {
    let (tx, mut rx) = channel::<u64>(Config::default());

    tx.send(1).await.expect("send failed");
    tx.send(2).await.expect("send failed");
    tx.send(3).await.expect("send failed");
    tx.close();

    let mut received = Vec::new();
    while let Some(item) = rx.next().await {
        received.push(item);
    }

    assert_eq!(received, vec![1, 2, 3]);
}

#[tokio::test]
async fn try_send_preserves_item_on_full() {
    let config = Config::new(2, false); // 4 slots
    let (tx, _rx) = channel::<u64>(config);

    for i in 0..4 {
        tx.try_send(i).expect("should succeed");
    }

    let result = tx.try_send(100);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err(), 100);
}

#[tokio::test]
async fn sink_trait_methods() {
    let (mut tx, mut rx) = channel::<u64>(Config::default());

    tx.send(42).await.expect("send failed");
    tx.flush().await.expect("flush failed");
    tx.close();

    let item = rx.next().await;
    assert_eq!(item, Some(42));
}

#[tokio::test]
async fn graceful_shutdown_drains_before_ending() {
    let (tx, mut rx) = channel::<u64>(Config::default());

    tx.send(1).await.expect("send failed");
    tx.send(2).await.expect("send failed");

    rx.shutdown();

    let mut received = Vec::new();
    while let Some(item) = rx.next().await {
        received.push(item);
    }

    assert_eq!(received, vec![1, 2]);
}

#[tokio::test]
async fn stream_config_presets_and_builder() {
    let config = StreamConfig::low_latency();
    assert_eq!(config.poll_interval, Duration::from_millis(1));
    assert_eq!(config.batch_hint, 16);

    let config = StreamConfig::high_throughput();
    assert_eq!(config.poll_interval, Duration::from_millis(50));
    assert_eq!(config.batch_hint, 256);

    let config = StreamConfig::default()
        .with_poll_interval(Duration::from_millis(5))
        .with_batch_hint(128);
    assert_eq!(config.poll_interval, Duration::from_millis(5));
    assert_eq!(config.batch_hint, 128);
}

#[tokio::test]
async fn closed_sender_is_observed_by_receiver() {
    let (tx, mut rx) = channel::<u64>(Config::default());
    tx.send(1).await.expect("send failed");
    tx.close();
    assert!(tx.is_closed());

    let mut received = Vec::new();
    while let Some(item) = rx.next().await {
        received.push(item);
    }
    assert_eq!(received, vec![1]);
}

#[tokio::test]
async fn fifo_ordering_is_preserved() {
    let (tx, mut rx) = channel::<u64>(Config::default());

    for i in 0..100 {
        tx.send(i).await.expect("send failed");
    }
    tx.close();

    let mut prev = None;
    while let Some(item) = rx.next().await {
        if let Some(p) = prev {
            assert!(item > p, "FIFO violation: {item} came after {p}");
        }
        prev = Some(item);
    }

    assert_eq!(prev, Some(99));
}

#[tokio::test]
async fn shutdown_signal_can_be_triggered_remotely() {
    let (tx, mut rx) = channel::<u64>(Config::default());
    let signal = rx.shutdown_signal();

    tx.send(7).await.expect("send failed");
    signal.shutdown();
    assert!(signal.is_shutdown());

    let mut received = Vec::new();
    while let Some(item) = rx.next().await {
        received.push(item);
    }
    assert_eq!(received, vec![7]);
}
