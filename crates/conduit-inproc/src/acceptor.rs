//! In-process Acceptor: registers a name in the process-wide registry and
//! admits whoever connects to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use conduit_core::{
    Acceptor, CallbackSlot, Endpoint, Error, OnClientConnected, OnClientDisconnected, OnReceived,
    Result,
};
use conduit_ring::Config;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::endpoint::InprocEndpoint;
use crate::registry::{self, ConnectRequest};

/// A named in-process server: [`InprocEndpoint::connect`] calls naming the
/// same name are handed a connected pair's client half.
pub struct InprocAcceptor {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: Config,
    on_client_connected: CallbackSlot<OnClientConnected>,
    on_client_disconnected: CallbackSlot<OnClientDisconnected>,
    on_received: CallbackSlot<OnReceived>,
    clients: StdMutex<HashMap<u64, Arc<InprocEndpoint>>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    requests: StdMutex<Option<mpsc::UnboundedReceiver<ConnectRequest>>>,
    discovery_task: StdMutex<Option<JoinHandle<()>>>,
}

impl InprocAcceptor {
    /// Publishes `name` in the process-wide registry. Call [`Acceptor::start`]
    /// to begin accepting `connect(name)` calls.
    pub fn bind(name: impl Into<String>, config: Config) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        registry::publish(name.clone(), tx);
        Self {
            inner: Arc::new(Inner {
                name,
                config,
                on_client_connected: CallbackSlot::new(),
                on_client_disconnected: CallbackSlot::new(),
                on_received: CallbackSlot::new(),
                clients: StdMutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                requests: StdMutex::new(Some(rx)),
                discovery_task: StdMutex::new(None),
            }),
        }
    }

    async fn discovery_loop(inner: Arc<Inner>, mut requests: mpsc::UnboundedReceiver<ConnectRequest>) {
        while let Some(request) = requests.recv().await {
            let (server_side, client_side) = InprocEndpoint::pair(inner.config);
            let server_side = Arc::new(server_side);

            let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
            inner
                .clients
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, Arc::clone(&server_side));

            let inner_for_received = Arc::clone(&inner);
            server_side.set_on_received(Box::new(move |endpoint, frame| {
                inner_for_received
                    .on_received
                    .with(|cb| cb(endpoint, frame));
            }));

            let inner_for_disconnect = Arc::clone(&inner);
            server_side.set_on_disconnected(Box::new(move |_endpoint| {
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
                .with(|cb| cb(Arc::clone(&server_side) as Arc<dyn Endpoint>));

            let _ = request.respond.send(client_side);
        }
    }
}

impl Drop for InprocAcceptor {
    fn drop(&mut self) {
        registry::unpublish(&self.inner.name);
    }
}

#[async_trait]
impl Acceptor for InprocAcceptor {
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
        let mut task_guard = self
            .inner
            .discovery_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if task_guard.is_some() {
            return Ok(());
        }
        let requests = self
            .inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(Error::Disposed)?;
        let inner = Arc::clone(&self.inner);
        *task_guard = Some(tokio::spawn(Self::discovery_loop(inner, requests)));
        Ok(())
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        registry::unpublish(&self.inner.name);
        if let Some(handle) = self
            .inner
            .discovery_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
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
