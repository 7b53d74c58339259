//! Integration tests for conduit-tcp, covering the three literal TCP
//! scenarios: echo, chunked frame arrival, and payload-too-large.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_core::{Acceptor, Endpoint};
use conduit_tcp::{TcpAcceptor, TcpConfig, TcpEndpoint};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn spawn_echo_server(config: TcpConfig) -> std::net::SocketAddr {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0", config).await.unwrap();
    let addr = acceptor.local_addr().unwrap();
    acceptor.set_on_received(Box::new(|endpoint, frame| {
        let _ = endpoint.send(frame);
    }));
    acceptor.start().unwrap();
    // Leaked deliberately: the acceptor must outlive the test's assertions
    // and there is no owning scope to return it into across `spawn`.
    Box::leak(Box::new(acceptor));
    addr
}

#[tokio::test]
async fn echoes_a_small_payload() {
    let addr = spawn_echo_server(TcpConfig::default()).await;
    let client = TcpEndpoint::connect(addr, TcpConfig::default())
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    client.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    client.send(b"hello").unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    assert_eq!(echoed, b"hello");
}

#[tokio::test]
async fn reassembles_a_frame_delivered_across_multiple_writes() {
    let addr = spawn_echo_server(TcpConfig::default()).await;
    let client = TcpEndpoint::connect(addr, TcpConfig::default())
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    client.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    // Frame the payload by hand and write it to the wire in three
    // separate chunks (4 / 100 / 900 bytes) so the server-side parser must
    // reassemble a frame whose header and body both straddle `read()`
    // calls. The OS may still coalesce these writes into fewer segments
    // than written; the assertion is on end-to-end correctness of the
    // reassembled frame, not on the literal segment count.
    let payload = vec![7u8; 1000];
    let mut framed = Vec::new();
    conduit_ring::frame::FrameParser::encode(8192, &payload, &mut framed).unwrap();
    assert_eq!(framed.len(), 1004);

    let mut raw = TcpStream::connect(addr).await.unwrap();
    let (first, rest) = framed.split_at(4);
    let (second, third) = rest.split_at(100);
    for chunk in [first, second, third] {
        raw.write_all(chunk).await.unwrap();
        raw.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let echoed = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn oversized_payload_fails_synchronously_then_endpoint_recovers() {
    let config = TcpConfig::new(64, 1, 16);
    let addr = spawn_echo_server(config).await;
    let client = TcpEndpoint::connect(addr, config).await.unwrap();

    let oversized = vec![0u8; 100];
    let err = client.send(&oversized).unwrap_err();
    assert!(matches!(
        err,
        conduit_core::Error::PayloadTooLarge { len: 100, max: 60 }
    ));

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    client.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    let small = vec![1u8; 10];
    client.send(&small).unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    assert_eq!(echoed, small);
}
