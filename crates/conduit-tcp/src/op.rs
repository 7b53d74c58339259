//! Async socket operation abstraction.
//!
//! Each direction of a `TcpStream` gets exactly one reusable operation
//! object: [`SendOp`] owns the slice backing the single reusable send path,
//! [`RecvOp`] owns the slice the receive loop reads into. Starting an
//! operation (`submit`) is the non-blocking half — `tokio`'s reactor
//! resolves the returned future inline when the kernel already had room
//! (a socket ready for writing, data already buffered for reading) and
//! parks the calling task otherwise, since only one operation per
//! direction is ever in flight at a time.

use conduit_ring::frame::FrameParser;
use conduit_ring::pool::{BufferPool, PooledSlice};
use conduit_ring::Backoff;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::TcpError;

/// The single reusable send operation backing [`crate::TcpEndpoint::send`]
/// and [`crate::TcpEndpoint::send_async`]. Concurrent callers serialize on
/// whatever lock wraps this (a `tokio::sync::Mutex` in `endpoint.rs`).
pub(crate) struct SendOp {
    slice: PooledSlice,
}

impl SendOp {
    /// Rents the one slot `pool` is expected to hold for this endpoint.
    pub(crate) fn new(pool: &BufferPool) -> Option<Self> {
        pool.try_rent().map(|slice| Self { slice })
    }

    /// Frames `payload` into the owned slice and writes it in full.
    pub(crate) async fn submit(
        &mut self,
        write_half: &mut OwnedWriteHalf,
        max_frame: usize,
        payload: &[u8],
    ) -> Result<(), TcpError> {
        let mut framed = Vec::with_capacity(payload.len() + 4);
        FrameParser::encode(max_frame, payload, &mut framed)?;
        if !self.slice.write(&framed) {
            return Err(TcpError::PayloadTooLarge {
                len: payload.len(),
                max: max_frame - 4,
            });
        }
        write_half.write_all(self.slice.as_slice()).await?;
        Ok(())
    }

    /// The non-blocking counterpart to `submit`, backing
    /// [`conduit_core::Endpoint::send`]. Writes with `try_write`, spinning
    /// through a bounded [`Backoff`] if the kernel buffer is momentarily
    /// full instead of suspending the calling task.
    pub(crate) fn try_submit(
        &mut self,
        write_half: &OwnedWriteHalf,
        max_frame: usize,
        payload: &[u8],
    ) -> Result<(), TcpError> {
        let mut framed = Vec::with_capacity(payload.len() + 4);
        FrameParser::encode(max_frame, payload, &mut framed)?;
        if !self.slice.write(&framed) {
            return Err(TcpError::PayloadTooLarge {
                len: payload.len(),
                max: max_frame - 4,
            });
        }

        let buf = self.slice.as_slice();
        let mut offset = 0;
        let mut backoff = Backoff::new();
        while offset < buf.len() {
            match write_half.try_write(&buf[offset..]) {
                Ok(n) => {
                    offset += n;
                    backoff.reset();
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if backoff.is_completed() {
                        return Err(TcpError::Io(e));
                    }
                    backoff.snooze();
                }
                Err(e) => return Err(TcpError::Io(e)),
            }
        }
        Ok(())
    }
}

/// The receive loop's single in-flight read operation.
pub(crate) struct RecvOp {
    slice: PooledSlice,
}

impl RecvOp {
    pub(crate) fn new(pool: &BufferPool) -> Option<Self> {
        pool.try_rent().map(|slice| Self { slice })
    }

    /// Reads one chunk off the socket into the owned slice. `Ok(0)` means
    /// the peer closed its write half in an orderly shutdown.
    pub(crate) async fn submit(&mut self, read_half: &mut OwnedReadHalf) -> Result<usize, TcpError> {
        let buf = self.slice.as_mut_full_slice();
        let n = read_half.read(buf).await?;
        self.slice.set_len(n);
        Ok(n)
    }

    pub(crate) fn filled(&self) -> &[u8] {
        self.slice.as_slice()
    }
}
