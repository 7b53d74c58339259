//! TCP Acceptor: binds a listener and hands out a connected Endpoint per
//! accepted socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use conduit_core::{
    Acceptor, CallbackSlot, Endpoint, Error, OnClientConnected, OnClientDisconnected, OnReceived,
    Result,
};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use crate::config::TcpConfig;
use crate::endpoint::TcpEndpoint;

/// Listens for TCP connections and produces one [`TcpEndpoint`] per
/// accepted peer.
///
/// `tokio`'s listener already accepts asynchronously off one reactor-driven
/// loop — unlike an IOCP-style backend, there is no benefit to keeping
/// `config.parallelism` separate `accept` operations posted at once, since
/// the OS backlog absorbs the queuing a single `accept().await` loop would
/// otherwise need multiple in-flight operations to cover.
pub struct TcpAcceptor {
    inner: Arc<Inner>,
}

struct Inner {
    config: TcpConfig,
    on_client_connected: CallbackSlot<OnClientConnected>,
    on_client_disconnected: CallbackSlot<OnClientDisconnected>,
    on_received: CallbackSlot<OnReceived>,
    clients: StdMutex<HashMap<u64, Arc<TcpEndpoint>>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    listener: StdMutex<Option<TcpListener>>,
    accept_task: StdMutex<Option<JoinHandle<()>>>,
}

impl TcpAcceptor {
    /// Binds `addr`. `config.backlog` is recorded but not applied to the
    /// listening socket — see [`TcpEndpoint::from_stream`]'s note on why
    /// this workspace doesn't take on `socket2` for socket-option tuning.
    pub async fn bind(addr: impl ToSocketAddrs, config: TcpConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                on_client_connected: CallbackSlot::new(),
                on_client_disconnected: CallbackSlot::new(),
                on_received: CallbackSlot::new(),
                clients: StdMutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                listener: StdMutex::new(Some(listener)),
                accept_task: StdMutex::new(None),
            }),
        })
    }

    /// The bound local address, once `bind` has succeeded.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.inner
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotConnected, "acceptor disposed")
            })
            .and_then(TcpListener::local_addr)
    }

    async fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(?err, "tcp acceptor stopping on accept error");
                    return;
                }
            };

            let config = inner.config;
            let client = match TcpEndpoint::from_stream(stream, config) {
                Ok(client) => Arc::new(client),
                Err(err) => {
                    tracing::warn!(?err, "dropping connection that failed setup");
                    continue;
                }
            };

            let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
            inner
                .clients
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, Arc::clone(&client));

            let inner_for_received = Arc::clone(&inner);
            client.set_on_received(Box::new(move |endpoint, frame| {
                inner_for_received
                    .on_received
                    .with(|cb| cb(endpoint, frame));
            }));

            let inner_for_disconnect = Arc::clone(&inner);
            client.set_on_disconnected(Box::new(move |_endpoint| {
                let removed = inner_for_disconnect
                    .clients
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                if let Some(removed) = removed {
                    inner_for_disconnect
                        .on_client_disconnected
                        .with(|cb| cb(removed as Arc<dyn Endpoint>));
                }
            }));

            inner
                .on_client_connected
                .with(|cb| cb(Arc::clone(&client) as Arc<dyn Endpoint>));
        }
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    fn set_on_client_connected(&self, callback: Box<OnClientConnected>) {
        self.inner.on_client_connected.set(callback);
    }

    fn set_on_client_disconnected(&self, callback: Box<OnClientDisconnected>) {
        self.inner.on_client_disconnected.set(callback);
    }

    fn set_on_received(&self, callback: Box<OnReceived>) {
        self.inner.on_received.set(callback);
    }

    fn start(&self) -> Result<()> {
        let mut accept_task = self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if accept_task.is_some() {
            return Ok(());
        }
        let listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(Error::Disposed)?;
        let inner = Arc::clone(&self.inner);
        *accept_task = Some(tokio::spawn(Self::accept_loop(inner, listener)));
        Ok(())
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self
            .inner
            .accept_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.inner.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
        let clients: Vec<_> = self
            .inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, endpoint)| endpoint)
            .collect();
        for client in clients {
            client.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
