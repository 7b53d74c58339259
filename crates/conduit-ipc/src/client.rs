//! IPC Endpoint: a client's handle onto a shared-memory channel with a
//! live server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use conduit_core::{
    CallbackSlot, Endpoint, Error, OnConnected, OnDisconnected, OnReceived, Payload, Result,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::config::IpcConfig;
use crate::error::IpcError;
use crate::layout::{ClientState, ControlHeader};
use crate::region::open_or_create;
use crate::ring::{RingReader, RingWriter};

pub struct IpcEndpoint {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IpcEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcEndpoint").finish_non_exhaustive()
    }
}

struct Inner {
    config: IpcConfig,
    control: memmap2::MmapMut,
    slot_index: usize,
    client_id: u64,
    c2s: AsyncMutex<RingWriter>,
    on_received: CallbackSlot<OnReceived>,
    on_connected: CallbackSlot<OnConnected>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
    recv_task: StdMutex<Option<JoinHandle<()>>>,
    heartbeat_task: StdMutex<Option<JoinHandle<()>>>,
}

fn now_ticks() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl IpcEndpoint {
    /// Connects to a live [`crate::IpcServer`] bound under `config.name`.
    /// Fails with `ConnectionFailed` if no server has initialized the
    /// control region yet — IPC clients never implicitly create a server.
    pub async fn connect(config: IpcConfig) -> Result<Self> {
        let control_path = config.control_path();
        let (control, fresh) = open_or_create(&control_path, ControlHeader::SIZE)
            .map_err(IpcError::from)
            .map_err(Error::from)?;
        if fresh {
            // Nobody has bound a server under this name yet; an empty
            // zero-filled region reads as `server_alive == 0` either way.
            return Err(IpcError::NoServer.into());
        }
        let header = ControlHeader::from_bytes(&control);
        if header.server_alive.load(Ordering::Acquire) == 0 {
            return Err(IpcError::NoServer.into());
        }

        let client_id = claim_slot(header)?;
        let slot_index = header
            .slots
            .iter()
            .position(|s| s.client_id.load(Ordering::Relaxed) == client_id)
            .expect("slot just claimed");

        let c2s = RingWriter::open(
            &config.ring_path(client_id, "c2s"),
            config.ring_capacity,
            config.max_frame,
        )
        .map_err(IpcError::from)
        .map_err(Error::from)?;
        let s2c = RingReader::open(
            &config.ring_path(client_id, "s2c"),
            config.ring_capacity,
            config.max_frame,
        )
        .map_err(IpcError::from)
        .map_err(Error::from)?;

        header.slots[slot_index]
            .last_heartbeat_ticks
            .store(now_ticks(), Ordering::Relaxed);
        header.slots[slot_index]
            .state
            .store(ClientState::Live as u8, Ordering::Release);

        let endpoint = Self {
            inner: Arc::new(Inner {
                config,
                control,
                slot_index,
                client_id,
                c2s: AsyncMutex::new(c2s),
                on_received: CallbackSlot::new(),
                on_connected: CallbackSlot::new(),
                on_disconnected: CallbackSlot::new(),
                disposed: AtomicBool::new(false),
                recv_task: StdMutex::new(None),
                heartbeat_task: StdMutex::new(None),
            }),
        };
        endpoint.spawn_recv_loop(s2c);
        endpoint.spawn_heartbeat_loop();
        endpoint.inner.on_connected.with(|cb| cb(&endpoint));
        Ok(endpoint)
    }

    fn spawn_recv_loop(&self, mut reader: RingReader) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(2));
            loop {
                interval.tick().await;
                if inner.disposed.load(Ordering::Acquire) {
                    break;
                }
                let endpoint = IpcEndpoint {
                    inner: Arc::clone(&inner),
                };
                let result = reader.poll_frames(|frame| {
                    inner.on_received.with(|cb| cb(&endpoint, frame));
                });
                if result.is_err() {
                    break;
                }
            }
            IpcEndpoint::close_internal(&inner);
        });
        *self
            .inner
            .recv_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    fn spawn_heartbeat_loop(&self) {
        let inner = Arc::clone(&self.inner);
        let period = inner.config.heartbeat_interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if inner.disposed.load(Ordering::Acquire) {
                    break;
                }
                let header = ControlHeader::from_bytes(&inner.control);
                header.slots[inner.slot_index]
                    .last_heartbeat_ticks
                    .store(now_ticks(), Ordering::Relaxed);
            }
        });
        *self
            .inner
            .heartbeat_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    fn close_internal(inner: &Arc<Inner>) {
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let header = ControlHeader::from_bytes(&inner.control);
        header.slots[inner.slot_index]
            .state
            .store(ClientState::Leaving as u8, Ordering::Release);
        for task in [
            inner
                .recv_task
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
            inner
                .heartbeat_task
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        let endpoint = IpcEndpoint {
            inner: Arc::clone(inner),
        };
        inner.on_disconnected.with(|cb| cb(&endpoint));
    }
}

/// CAS-claims the first `Empty` slot, setting its state to `Joining` with a
/// locally chosen nonzero client id.
fn claim_slot(header: &ControlHeader) -> Result<u64> {
    let client_id = loop {
        let candidate = now_ticks() ^ (std::ptr::addr_of!(*header) as u64);
        if candidate != 0 {
            break candidate;
        }
    };
    for slot in &header.slots {
        if slot
            .state
            .compare_exchange(
                ClientState::Empty as u8,
                ClientState::Joining as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            slot.client_id.store(client_id, Ordering::Relaxed);
            return Ok(client_id);
        }
    }
    Err(IpcError::SlotsExhausted.into())
}

#[cfg(test)]
impl IpcEndpoint {
    /// Aborts this endpoint's background tasks without updating its slot
    /// state or firing callbacks, simulating a client process that
    /// disappeared without a clean shutdown — the server is expected to
    /// notice via heartbeat timeout rather than a `Leaving` transition.
    pub(crate) fn simulate_crash(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        if let Some(task) = self
            .inner
            .recv_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        if let Some(task) = self
            .inner
            .heartbeat_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl Clone for IpcEndpoint {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::IpcServer;
    use conduit_core::Acceptor;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn test_config(dir: &std::path::Path, name: &str) -> IpcConfig {
        IpcConfig::new(name)
            .with_dir(dir)
            .with_ring_capacity(4096)
    }

    #[tokio::test]
    async fn client_disappearance_is_detected_by_heartbeat_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "crash-test");
        config.heartbeat_interval = Duration::from_millis(10);
        config.heartbeat_timeout = Duration::from_millis(50);

        let server = IpcServer::bind(config.clone()).unwrap();
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(StdMutex::new(Some(tx)));
        server.set_on_client_disconnected(Box::new(move |_proxy| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }));
        server.start().unwrap();

        let client = IpcEndpoint::connect(config).await.unwrap();
        client.simulate_crash();

        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("server never noticed the crashed client")
            .unwrap();
    }
}

#[async_trait]
impl Endpoint for IpcEndpoint {
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
        let mut writer = self
            .inner
            .c2s
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
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut writer = self.inner.c2s.lock().await;
        writer
            .write_frame(payload.as_slice())
            .await
            .map_err(IpcError::from)
            .map_err(Error::from)
    }

    fn dispose(&self) {
        tracing::debug!(client_id = self.inner.client_id, "disposing IPC endpoint");
        Self::close_internal(&self.inner);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
