//! The `Endpoint`/`Acceptor` contract every backend implements.

use crate::error::Error;
use crate::payload::Payload;
use async_trait::async_trait;
use std::sync::Arc;

/// Invoked once per received message, with a view valid only for the
/// duration of the call — callers that need to retain the bytes must copy
/// them before returning.
pub type OnReceived = dyn Fn(&dyn Endpoint, &[u8]) + Send + Sync;
pub type OnConnected = dyn Fn(&dyn Endpoint) + Send + Sync;
pub type OnDisconnected = dyn Fn(&dyn Endpoint) + Send + Sync;
pub type OnClientConnected = dyn Fn(Arc<dyn Endpoint>) + Send + Sync;
pub type OnClientDisconnected = dyn Fn(Arc<dyn Endpoint>) + Send + Sync;

/// A message-passing handle exposing send/receive over one backend.
///
/// Implemented by `TcpEndpoint`, `IpcEndpoint`, `InprocEndpoint`,
/// `UdpEndpoint`, and the `conduit-reconnect` wrapper around any of the
/// above. Held as `Box<dyn Endpoint>`/`Arc<dyn Endpoint>` by callers that
/// want one import path across backends.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Replaces the `on_received` callback. Effective starting with the
    /// next received message.
    fn set_on_received(&self, callback: Box<OnReceived>);

    /// Replaces the `on_connected` callback.
    fn set_on_connected(&self, callback: Box<OnConnected>);

    /// Replaces the `on_disconnected` callback.
    fn set_on_disconnected(&self, callback: Box<OnDisconnected>);

    /// Sends `payload`. Never suspends past a ring-park; returns as soon
    /// as the transport has accepted the bytes for transmission (TCP) or
    /// enqueued the record (IPC/in-proc).
    fn send(&self, payload: &[u8]) -> Result<(), Error>;

    /// Sends `payload`, suspending until the transport accepts it —
    /// completion of the OS submit on TCP, or until ring space exists on
    /// IPC/in-proc. Does not wait for peer acknowledgment.
    async fn send_async(&self, payload: Payload) -> Result<(), Error>;

    /// Idempotent teardown: quiesces the receive loop, wakes any suspended
    /// sender with `Error::Disposed`, and invokes `on_disconnected` at most
    /// once total across all calls.
    fn dispose(&self);

    /// Returns `true` once `dispose` has run.
    fn is_disposed(&self) -> bool;
}

/// A server object that produces one `Endpoint` per accepted peer.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// Replaces the `on_client_connected` callback.
    fn set_on_client_connected(&self, callback: Box<OnClientConnected>);

    /// Replaces the `on_client_disconnected` callback.
    fn set_on_client_disconnected(&self, callback: Box<OnClientDisconnected>);

    /// Replaces the `on_received` callback, fired with the per-client proxy
    /// Endpoint whose `send` writes back to that client.
    fn set_on_received(&self, callback: Box<OnReceived>);

    /// Starts accepting connections. Calling `start` on an already-started
    /// acceptor is a no-op.
    fn start(&self) -> Result<(), Error>;

    /// Idempotent teardown of the acceptor and every Endpoint it produced.
    fn dispose(&self);

    /// Returns `true` once `dispose` has run.
    fn is_disposed(&self) -> bool;
}
