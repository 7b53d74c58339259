use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_core::{Acceptor, Endpoint};
use conduit_inproc::{InprocAcceptor, InprocEndpoint};
use conduit_ring::Config;
use tokio::sync::oneshot;

#[tokio::test]
async fn pair_exchanges_messages_in_both_directions() {
    let (a, b) = InprocEndpoint::pair(Config::default());

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    b.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    a.send(b"hello from a").unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(received, b"hello from a");

    let (tx2, rx2) = oneshot::channel();
    let tx2 = Arc::new(Mutex::new(Some(tx2)));
    a.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx2) = tx2.lock().unwrap().take() {
            let _ = tx2.send(frame.to_vec());
        }
    }));
    b.send(b"hello from b").unwrap();
    let received2 = tokio::time::timeout(Duration::from_secs(5), rx2)
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(received2, b"hello from b");
}

#[tokio::test]
async fn acceptor_accepts_a_named_connect() {
    let acceptor = InprocAcceptor::bind("test-channel", Config::default());
    acceptor.set_on_received(Box::new(|endpoint, frame| {
        let _ = endpoint.send(frame);
    }));
    acceptor.start().unwrap();

    let client = InprocEndpoint::connect("test-channel").await.unwrap();

    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    client.set_on_received(Box::new(move |_endpoint, frame| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(frame.to_vec());
        }
    }));

    client.send(b"ping").unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(echoed, b"ping");

    acceptor.dispose();
}

#[tokio::test]
async fn connect_to_unbound_name_fails() {
    let err = InprocEndpoint::connect("never-bound-name").await.unwrap_err();
    assert!(matches!(err, conduit_core::Error::ConnectionFailed { .. }));
}
