use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_core::{Acceptor, Endpoint};
use conduit_ipc::{IpcConfig, IpcEndpoint, Server};
use tokio::sync::oneshot;

fn test_config(dir: &std::path::Path, name: &str) -> IpcConfig {
    IpcConfig::new(name).with_dir(dir).with_ring_capacity(4096)
}

#[tokio::test]
async fn client_and_server_round_trip_a_message() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "round-trip");

    let server = Server::bind(config.clone()).unwrap();
    server.set_on_received(Box::new(|endpoint, frame| {
        let _ = endpoint.send(frame);
    }));
    server.start().unwrap();

    let client = IpcEndpoint::connect(config).await.unwrap();
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    client.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    client.send(b"ping over shared memory").unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out waiting for echo")
        .unwrap();
    assert_eq!(echoed, b"ping over shared memory");

    client.dispose();
    server.dispose();
}

#[tokio::test]
async fn connecting_before_a_server_binds_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), "never-bound");
    let err = IpcEndpoint::connect(config).await.unwrap_err();
    assert!(matches!(err, conduit_core::Error::ConnectionFailed { .. }));
}
