//! In-process Endpoint: the heap-only counterpart of the IPC Endpoint.
//!
//! Each direction of a pair is one `conduit_async` ring channel of
//! `Vec<u8>` frames instead of a byte-stream ring over shared memory. No
//! magic, version, or cross-process handshake is needed since both ends of
//! a pair share the same address space.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use conduit_async::{channel, RingReceiver, RingSender, StreamError, StreamExt};
use conduit_core::{
    CallbackSlot, Endpoint, Error, OnConnected, OnDisconnected, OnReceived, Payload, Result,
};
use conduit_ring::Config;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::registry::{self, ConnectRequest};

pub struct InprocEndpoint {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InprocEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InprocEndpoint").finish_non_exhaustive()
    }
}

struct Inner {
    sender: RingSender<Vec<u8>>,
    on_received: CallbackSlot<OnReceived>,
    on_connected: CallbackSlot<OnConnected>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
    recv_task: StdMutex<Option<JoinHandle<()>>>,
}

impl InprocEndpoint {
    /// Creates a connected pair of Endpoints sharing two ring channels, one
    /// per direction. This is the degenerate, heap-only case of an
    /// IPC client/server pair: no control region, no handshake.
    pub fn pair(config: Config) -> (Self, Self) {
        let (sender_ab, rx_ab) = channel::<Vec<u8>>(config);
        let (sender_ba, rx_ba) = channel::<Vec<u8>>(config);

        let a = Self::new(sender_ab);
        let b = Self::new(sender_ba);
        a.spawn_recv_loop(rx_ba);
        b.spawn_recv_loop(rx_ab);

        a.inner.on_connected.with(|cb| cb(&a));
        b.inner.on_connected.with(|cb| cb(&b));
        (a, b)
    }

    /// Connects to a live [`crate::InprocAcceptor`] bound under `name`.
    /// Fails with *ConnectionFailed* if no acceptor has published that
    /// name — in-process clients never implicitly create a server.
    pub async fn connect(name: &str) -> Result<Self> {
        let sender = registry::lookup(name).ok_or_else(|| Error::ConnectionFailed {
            reason: format!("no inproc acceptor bound under {name:?}"),
        })?;
        let (respond, response) = oneshot::channel();
        sender
            .send(ConnectRequest { respond })
            .map_err(|_| Error::ConnectionFailed {
                reason: format!("inproc acceptor {name:?} is no longer accepting"),
            })?;
        response.await.map_err(|_| Error::ConnectionFailed {
            reason: format!("inproc acceptor {name:?} dropped the connect request"),
        })
    }

    pub(crate) fn new(sender: RingSender<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sender,
                on_received: CallbackSlot::new(),
                on_connected: CallbackSlot::new(),
                on_disconnected: CallbackSlot::new(),
                disposed: AtomicBool::new(false),
                recv_task: StdMutex::new(None),
            }),
        }
    }

    pub(crate) fn spawn_recv_loop(&self, mut receiver: RingReceiver<Vec<u8>>) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(frame) = receiver.next().await {
                if inner.disposed.load(Ordering::Acquire) {
                    break;
                }
                let endpoint = InprocEndpoint {
                    inner: Arc::clone(&inner),
                };
                inner.on_received.with(|cb| cb(&endpoint, &frame));
            }
            InprocEndpoint::close_internal(&inner);
        });
        *self
            .inner
            .recv_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    fn close_internal(inner: &Arc<Inner>) {
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.sender.close();
        if let Some(handle) = inner
            .recv_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        let endpoint = InprocEndpoint {
            inner: Arc::clone(inner),
        };
        inner.on_disconnected.with(|cb| cb(&endpoint));
    }
}

impl Clone for InprocEndpoint {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Endpoint for InprocEndpoint {
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
        self.inner
            .sender
            .try_send(payload.to_vec())
            .map_err(|_| Error::RingFull)
    }

    async fn send_async(&self, payload: Payload) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        self.inner
            .sender
            .send(payload.as_slice().to_vec())
            .await
            .map_err(|err| match err {
                StreamError::Full => Error::RingFull,
                StreamError::Closed | StreamError::ShutDown => Error::Disposed,
            })
    }

    fn dispose(&self) {
        Self::close_internal(&self.inner);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
