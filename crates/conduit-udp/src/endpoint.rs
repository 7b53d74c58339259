//! UDP Endpoint: a connectionless datagram socket wrapped in the Endpoint
//! contract.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use conduit_core::{
    CallbackSlot, Endpoint, Error, OnConnected, OnDisconnected, OnReceived, Payload, Result,
};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::config::UdpConfig;
use crate::error::UdpError;

/// A UDP socket wrapped in the `conduit` Endpoint contract.
///
/// Unlike the ring and TCP backends, UDP never applies backpressure — the
/// network may drop a datagram regardless of what this Endpoint does, so
/// `send`/`send_async` both resolve as soon as the local socket accepts the
/// write and never suspend waiting for anything beyond that.
pub struct UdpEndpoint {
    inner: Arc<Inner>,
}

struct Inner {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    on_received: CallbackSlot<OnReceived>,
    on_connected: CallbackSlot<OnConnected>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
    recv_task: StdMutex<Option<JoinHandle<()>>>,
    max_datagram: usize,
}

impl UdpEndpoint {
    /// Binds `config.local_addr`, applies broadcast/multicast options, and
    /// starts the continuous receive loop.
    pub async fn bind(config: UdpConfig) -> Result<Self> {
        let socket =
            UdpSocket::bind(config.local_addr)
                .await
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;

        if config.allow_broadcast {
            socket
                .set_broadcast(true)
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        }
        if let Some(group) = config.multicast_group {
            socket
                .join_multicast_v4(group, std::net::Ipv4Addr::UNSPECIFIED)
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;
            socket
                .set_multicast_loop_v4(!config.disable_loopback)
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        }

        let inner = Arc::new(Inner {
            socket,
            remote_addr: config.remote_addr,
            on_received: CallbackSlot::new(),
            on_connected: CallbackSlot::new(),
            on_disconnected: CallbackSlot::new(),
            disposed: AtomicBool::new(false),
            recv_task: StdMutex::new(None),
            max_datagram: config.max_datagram,
        });

        let task = tokio::spawn(Self::recv_loop(Arc::clone(&inner)));
        *inner.recv_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);

        let endpoint = Self { inner };
        endpoint.inner.on_connected.with(|cb| cb(&endpoint));
        Ok(endpoint)
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.socket.local_addr()
    }

    /// Sends one datagram to an explicit destination, bypassing
    /// `config.remote_addr`.
    pub async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        self.inner
            .socket
            .send_to(payload, dest)
            .await
            .map_err(UdpError::from)?;
        Ok(())
    }

    async fn recv_loop(inner: Arc<Inner>) {
        let mut buf = vec![0u8; inner.max_datagram];
        loop {
            match inner.socket.recv(&mut buf).await {
                Ok(n) => {
                    let endpoint = UdpEndpoint {
                        inner: Arc::clone(&inner),
                    };
                    inner.on_received.with(|cb| cb(&endpoint, &buf[..n]));
                }
                Err(err) => {
                    tracing::debug!(?err, "udp endpoint closing on recv error");
                    Self::close_internal(&inner);
                    return;
                }
            }
        }
    }

    fn close_internal(inner: &Arc<Inner>) {
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = inner
            .recv_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        let endpoint = UdpEndpoint {
            inner: Arc::clone(inner),
        };
        inner.on_disconnected.with(|cb| cb(&endpoint));
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    fn set_on_received(&self, callback: Box<OnReceived>) {
        self.inner.on_received.set(callback);
    }

    fn set_on_connected(&self, callback: Box<OnConnected>) {
        self.inner.on_connected.set(callback);
    }

    fn set_on_disconnected(&self, callback: Box<OnDisconnected>) {
        self.inner.on_disconnected.set(callback);
    }

    fn send(&self, payload: &[u8]) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let dest = self.inner.remote_addr.ok_or(UdpError::NoRemote)?;
        self.inner
            .socket
            .try_send_to(payload, dest)
            .map_err(UdpError::from)?;
        Ok(())
    }

    async fn send_async(&self, payload: Payload) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let dest = self.inner.remote_addr.ok_or(UdpError::NoRemote)?;
        self.inner
            .socket
            .send_to(payload.as_slice(), dest)
            .await
            .map_err(UdpError::from)?;
        Ok(())
    }

    fn dispose(&self) {
        Self::close_internal(&self.inner);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
