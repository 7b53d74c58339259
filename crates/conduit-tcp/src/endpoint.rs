//! TCP Endpoint: a length-prefixed-frame connection over a Tokio socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use conduit_core::{
    CallbackSlot, Endpoint, Error, OnConnected, OnDisconnected, OnReceived, Payload, Result,
};
use conduit_ring::frame::FrameParser;
use conduit_ring::pool::BufferPool;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::config::TcpConfig;
use crate::error::TcpError;
use crate::op::{RecvOp, SendOp};

/// A TCP peer connection: dial out with [`connect`], or receive one from a
/// [`crate::TcpAcceptor`].
///
/// Frames are length-prefixed (`conduit_ring::frame`); `on_received` fires
/// once per decoded frame with a borrowed view valid only for the
/// callback's duration, matching [`conduit_core::Endpoint`]'s contract.
pub struct TcpEndpoint {
    inner: Arc<Inner>,
}

struct Inner {
    config: TcpConfig,
    peer_addr: Option<SocketAddr>,
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,
    send_op: AsyncMutex<Option<SendOp>>,
    burst_pool: BufferPool,
    on_received: CallbackSlot<OnReceived>,
    on_connected: CallbackSlot<OnConnected>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
    recv_task: StdMutex<Option<JoinHandle<()>>>,
}

impl TcpEndpoint {
    /// Dials `addr` and returns a live Endpoint. Disables Nagle's
    /// algorithm and requests `config.os_buffer_size` send/receive
    /// buffers.
    pub async fn connect(addr: impl ToSocketAddrs, config: TcpConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Self::from_stream(stream, config)
    }

    /// Wraps an already-connected socket, e.g. one handed to a
    /// `TcpAcceptor`'s `accept` loop.
    ///
    /// `config.os_buffer_size` is recorded for callers to introspect but
    /// not applied here — `tokio::net::TcpStream` doesn't expose
    /// `SO_SNDBUF`/`SO_RCVBUF` tuning without taking on `socket2`, which
    /// isn't otherwise needed by this workspace's stack.
    pub(crate) fn from_stream(stream: TcpStream, config: TcpConfig) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })?;
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();

        let send_pool = BufferPool::new(config.buffer_size, 1);
        let recv_pool = BufferPool::new(config.buffer_size, 1);
        let burst_pool = BufferPool::new(config.buffer_size, config.parallelism.max(1));
        let send_op = SendOp::new(&send_pool).expect("fresh pool always has a free slot");

        let inner = Arc::new(Inner {
            config,
            peer_addr,
            write_half: AsyncMutex::new(Some(write_half)),
            send_op: AsyncMutex::new(Some(send_op)),
            burst_pool,
            on_received: CallbackSlot::new(),
            on_connected: CallbackSlot::new(),
            on_disconnected: CallbackSlot::new(),
            disposed: AtomicBool::new(false),
            recv_task: StdMutex::new(None),
        });

        let recv_op = RecvOp::new(&recv_pool).expect("fresh pool always has a free slot");
        let task = tokio::spawn(Self::recv_loop(Arc::clone(&inner), read_half, recv_op));
        *inner.recv_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);

        let endpoint = Self { inner };
        endpoint.inner.on_connected.with(|cb| cb(&endpoint));
        Ok(endpoint)
    }

    /// The remote address this Endpoint is connected to, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Fire-and-forget send for concurrent producers that don't want to
    /// contend on the single reusable send operation. Frames are prepared
    /// from a dedicated burst pool of `config.parallelism` slices, but
    /// still written through the same ordered write half — TCP requires
    /// writes on one socket never interleave, so the pool buys independent
    /// framing, not independent wire ordering.
    pub async fn send_burst(&self, payload: Payload) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut slice = self.inner.burst_pool.try_rent().ok_or(Error::RingFull)?;
        let mut framed = Vec::with_capacity(payload.len() + 4);
        FrameParser::encode(self.inner.config.buffer_size, payload.as_slice(), &mut framed)
            .map_err(TcpError::from)?;
        if !slice.write(&framed) {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: self.inner.config.max_payload(),
            });
        }

        let mut guard = self.inner.write_half.lock().await;
        let write_half = guard.as_mut().ok_or(Error::Disposed)?;
        write_half
            .write_all(slice.as_slice())
            .await
            .map_err(Error::TransportFault)
    }

    async fn recv_loop(inner: Arc<Inner>, mut read_half: OwnedReadHalf, mut recv_op: RecvOp) {
        let mut parser = FrameParser::new(inner.config.buffer_size);
        loop {
            match recv_op.submit(&mut read_half).await {
                Ok(0) => {
                    Self::close_internal(&inner);
                    return;
                }
                Ok(_) => {
                    let endpoint = TcpEndpoint {
                        inner: Arc::clone(&inner),
                    };
                    let mut protocol_error = None;
                    parser.feed(
                        recv_op.filled(),
                        |frame| {
                            inner.on_received.with(|cb| cb(&endpoint, frame));
                        },
                        |err| protocol_error = Some(err),
                    );
                    if let Some(err) = protocol_error {
                        tracing::warn!(?err, "tcp endpoint closing on protocol error");
                        Self::close_internal(&inner);
                        return;
                    }
                }
                Err(err) => {
                    tracing::debug!(?err, "tcp endpoint closing on read error");
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
        if let Ok(mut guard) = inner.write_half.try_lock() {
            guard.take();
        }
        let endpoint = TcpEndpoint {
            inner: Arc::clone(inner),
        };
        inner.on_disconnected.with(|cb| cb(&endpoint));
    }
}

impl Clone for TcpEndpoint {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
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
        let max_payload = self.inner.config.max_payload();
        if payload.len() > max_payload {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: max_payload,
            });
        }

        let would_block = |what: &'static str| {
            Error::TransportFault(std::io::Error::new(std::io::ErrorKind::WouldBlock, what))
        };

        let mut op_guard = self
            .inner
            .send_op
            .try_lock()
            .map_err(|_| would_block("send operation already in flight"))?;
        let send_op = op_guard.as_mut().ok_or(Error::Disposed)?;

        let write_guard = self
            .inner
            .write_half
            .try_lock()
            .map_err(|_| would_block("write half already in use"))?;
        let write_half = write_guard.as_ref().ok_or(Error::Disposed)?;

        send_op
            .try_submit(write_half, self.inner.config.buffer_size, payload)
            .map_err(Error::from)
    }

    async fn send_async(&self, payload: Payload) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let max_payload = self.inner.config.max_payload();
        if payload.len() > max_payload {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: max_payload,
            });
        }

        let mut op_guard = self.inner.send_op.lock().await;
        let send_op = op_guard.as_mut().ok_or(Error::Disposed)?;

        let mut write_guard = self.inner.write_half.lock().await;
        let write_half = write_guard.as_mut().ok_or(Error::Disposed)?;

        send_op
            .submit(write_half, self.inner.config.buffer_size, payload.as_slice())
            .await
            .map_err(Error::from)
    }

    fn dispose(&self) {
        Self::close_internal(&self.inner);
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}
