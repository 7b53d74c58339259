use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_core::Endpoint;
use conduit_udp::{UdpConfig, UdpEndpoint};
use tokio::sync::oneshot;

#[tokio::test]
async fn sends_and_receives_a_datagram() {
    let server = UdpEndpoint::bind(UdpConfig::default()).await.unwrap();
    let server_addr = server.local_addr().unwrap();

    let client_config = UdpConfig::default().with_remote(server_addr);
    let client = UdpEndpoint::bind(client_config).await.unwrap();
    let client_addr = client.local_addr().unwrap();

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    server.set_on_received(Box::new(move |_endpoint, datagram| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(datagram.to_vec());
        }
    }));

    client.send_to(b"ping", server.local_addr().unwrap()).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    assert_eq!(received, b"ping");

    // `send` uses the configured remote_addr without specifying a destination.
    let (tx2, rx2) = oneshot::channel();
    let tx2 = Arc::new(Mutex::new(Some(tx2)));
    server.set_on_received(Box::new(move |_endpoint, datagram| {
        if let Some(tx2) = tx2.lock().unwrap().take() {
            let _ = tx2.send(datagram.to_vec());
        }
    }));
    client.send(b"pong").unwrap();
    let received2 = tokio::time::timeout(Duration::from_secs(5), rx2)
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    assert_eq!(received2, b"pong");
    assert_ne!(client_addr.port(), 0);
}
