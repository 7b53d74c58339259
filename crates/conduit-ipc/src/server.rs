//! IPC Acceptor: owns the control region and discovers/admits clients that
//! claim a slot in it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use conduit_core::{
    Acceptor, CallbackSlot, Endpoint, Error, OnClientConnected, OnClientDisconnected, OnConnected,
    OnDisconnected, OnReceived, Payload, Result,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::config::IpcConfig;
use crate::error::IpcError;
use crate::layout::{ClientState, ControlHeader};
use crate::region::open_or_create;
use crate::ring::{RingReader, RingWriter};

/// Per-client handle a connected server holds: the proxy `Endpoint`
/// callers see via `on_client_connected`, plus the background reader task
/// forwarding `c2s` frames into the server's `on_received` callback.
struct ClientHandle {
    proxy: Arc<ClientProxy>,
    reader_task: JoinHandle<()>,
}

/// The `Endpoint` a server hands out per connected client: `send` writes
/// into that client's `s2c` ring.
pub struct ClientProxy {
    client_id: u64,
    s2c: AsyncMutex<RingWriter>,
    on_received: CallbackSlot<OnReceived>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
}

impl ClientProxy {
    /// The client id this proxy was admitted under, visible so
    /// `on_client_connected`/`on_received` handlers can tell clients apart.
    pub fn client_id(&self) -> u64 {
        self.client_id
    }
}

#[async_trait]
impl Endpoint for ClientProxy {
    fn set_on_received(&self, callback: Box<OnReceived>) {
        self.on_received.set(callback);
    }

    fn set_on_connected(&self, _callback: Box<OnConnected>) {
        // A proxy is already connected by construction; nothing to fire.
    }

    fn set_on_disconnected(&self, callback: Box<OnDisconnected>) {
        self.on_disconnected.set(callback);
    }

    fn send(&self, payload: &[u8]) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut writer = self
            .s2c
            .try_lock()
            .map_err(|_| Error::TransportFault(std::io::Error::from(std::io::ErrorKind::WouldBlock)))?;
        let wrote = writer
            .try_write_frame(payload)
            .map_err(IpcError::from)
            .map_err(Error::from)?;
        if wrote {
            Ok(())
        } else {
            Err(Error::RingFull)
        }
    }

    async fn send_async(&self, payload: Payload) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut writer = self.s2c.lock().await;
        writer
            .write_frame(payload.as_slice())
            .await
            .map_err(IpcError::from)
            .map_err(Error::from)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.on_disconnected.with(|cb| cb(self));
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

pub struct IpcServer {
    inner: Arc<Inner>,
}

struct Inner {
    config: IpcConfig,
    control: memmap2::MmapMut,
    clients: StdMutex<HashMap<u64, ClientHandle>>,
    on_client_connected: CallbackSlot<OnClientConnected>,
    on_client_disconnected: CallbackSlot<OnClientDisconnected>,
    on_received: CallbackSlot<OnReceived>,
    disposed: AtomicBool,
    discovery_task: StdMutex<Option<JoinHandle<()>>>,
}

fn now_ticks() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl IpcServer {
    /// Creates (or resets) the control region under `config.name` and
    /// marks it live. Call [`Acceptor::start`] to begin the discovery loop.
    pub fn bind(config: IpcConfig) -> Result<Self> {
        let (mut control, _) = open_or_create(&config.control_path(), ControlHeader::SIZE)
            .map_err(IpcError::from)
            .map_err(Error::from)?;
        ControlHeader::init(&mut control);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                control,
                clients: StdMutex::new(HashMap::new()),
                on_client_connected: CallbackSlot::new(),
                on_client_disconnected: CallbackSlot::new(),
                on_received: CallbackSlot::new(),
                disposed: AtomicBool::new(false),
                discovery_task: StdMutex::new(None),
            }),
        })
    }

    /// Sends `payload` to every currently live client. A client whose ring
    /// is full is skipped and logged rather than blocking the rest of the
    /// broadcast.
    pub fn broadcast(&self, payload: &[u8]) {
        let clients = self.inner.clients.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<_> = clients.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(handle) = clients.get(&id) {
                match handle.proxy.send(payload) {
                    Ok(()) => {}
                    Err(Error::RingFull) => {
                        tracing::warn!(client_id = id, "broadcast skipped full client ring");
                    }
                    Err(err) => {
                        tracing::warn!(client_id = id, error = %err, "broadcast send failed");
                    }
                }
            }
        }
    }

    async fn discovery_loop(inner: Arc<Inner>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(5));
        loop {
            interval.tick().await;
            if inner.disposed.load(Ordering::Acquire) {
                break;
            }
            let header = ControlHeader::from_bytes(&inner.control);
            for slot in &header.slots {
                let state = ClientState::from_u8(slot.state.load(Ordering::Acquire));
                let client_id = slot.client_id.load(Ordering::Relaxed);
                if client_id == 0 {
                    continue;
                }
                let already_tracked = inner
                    .clients
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .contains_key(&client_id);

                match state {
                    Some(ClientState::Live) if !already_tracked => {
                        Self::admit_client(&inner, client_id);
                    }
                    Some(ClientState::Leaving) if already_tracked => {
                        Self::evict_client(&inner, slot, client_id);
                    }
                    Some(ClientState::Leaving) => {
                        // Disconnected before we ever admitted it (fast
                        // connect-then-dispose race) — nothing to tear
                        // down, just free the slot.
                        slot.state.store(ClientState::Empty as u8, Ordering::Release);
                        slot.client_id.store(0, Ordering::Relaxed);
                    }
                    Some(ClientState::Live) | Some(ClientState::Joining) if already_tracked => {
                        let last = slot.last_heartbeat_ticks.load(Ordering::Relaxed);
                        if now_ticks().saturating_sub(last) > inner.config.heartbeat_timeout.as_millis() as u64 {
                            tracing::warn!(client_id, "client heartbeat timed out");
                            Self::evict_client(&inner, slot, client_id);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn admit_client(inner: &Arc<Inner>, client_id: u64) {
        let s2c = match RingWriter::open(
            &inner.config.ring_path(client_id, "s2c"),
            inner.config.ring_capacity,
            inner.config.max_frame,
        ) {
            Ok(w) => w,
            Err(err) => {
                tracing::warn!(client_id, error = %err, "failed to open s2c ring for client");
                return;
            }
        };
        let mut c2s = match RingReader::open(
            &inner.config.ring_path(client_id, "c2s"),
            inner.config.ring_capacity,
            inner.config.max_frame,
        ) {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(client_id, error = %err, "failed to open c2s ring for client");
                return;
            }
        };

        let proxy = Arc::new(ClientProxy {
            client_id,
            s2c: AsyncMutex::new(s2c),
            on_received: CallbackSlot::new(),
            on_disconnected: CallbackSlot::new(),
            disposed: AtomicBool::new(false),
        });

        let inner_for_reader = Arc::clone(inner);
        let proxy_for_reader = Arc::clone(&proxy);
        let reader_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(2));
            loop {
                interval.tick().await;
                if proxy_for_reader.disposed.load(Ordering::Acquire) {
                    break;
                }
                let result = c2s.poll_frames(|frame| {
                    inner_for_reader
                        .on_received
                        .with(|cb| cb(proxy_for_reader.as_ref(), frame));
                });
                if result.is_err() {
                    break;
                }
            }
        });

        inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                client_id,
                ClientHandle {
                    proxy: Arc::clone(&proxy),
                    reader_task,
                },
            );
        tracing::debug!(client_id, "admitted IPC client");
        inner
            .on_client_connected
            .with(|cb| cb(proxy as Arc<dyn Endpoint>));
    }

    fn evict_client(inner: &Arc<Inner>, slot: &crate::layout::ClientSlot, client_id: u64) {
        let handle = inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&client_id);
        if let Some(handle) = handle {
            handle.proxy.dispose();
            handle.reader_task.abort();
            inner
                .on_client_disconnected
                .with(|cb| cb(handle.proxy as Arc<dyn Endpoint>));
        }
        slot.state.store(ClientState::Empty as u8, Ordering::Release);
        slot.client_id.store(0, Ordering::Relaxed);
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        ControlHeader::from_bytes(&self.inner.control)
            .server_alive
            .store(0, Ordering::Release);
    }
}

#[async_trait]
impl Acceptor for IpcServer {
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
        let mut guard = self
            .inner
            .discovery_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(Self::discovery_loop(inner)));
        Ok(())
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self
            .inner
            .discovery_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        let handles: Vec<_> = self
            .inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in handles {
            handle.proxy.dispose();
            handle.reader_task.abort();
        }
        ControlHeader::from_bytes(&self.inner.control)
            .server_alive
            .store(0, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
