//! Centralized error taxonomy every backend converts into.

use thiserror::Error;

/// The error surface a caller sees regardless of which backend produced it.
///
/// Backend crates define their own narrower error type (e.g. `TcpError`,
/// `IpcError`) for internal use and implement `From<BackendError> for Error`,
/// so a caller holding a `Box<dyn Endpoint>` never has to match five
/// different enums.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload exceeds the backend's maximum. Synchronous, non-fatal —
    /// the Endpoint stays open.
    #[error("payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// Operation attempted on a disposed Endpoint or Acceptor.
    #[error("endpoint is disposed")]
    Disposed,

    /// TCP connect failed, UDP bind failed, or an IPC client found no live
    /// server.
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// An OS-level I/O error occurred mid-stream. Terminal for the
    /// Endpoint; surfaces via `on_disconnected`.
    #[error("transport fault: {0}")]
    TransportFault(#[source] std::io::Error),

    /// The frame parser saw a length prefix exceeding `MaxFrame`. Terminal
    /// for the Endpoint.
    #[error("frame length {len} exceeds the maximum of {max} bytes")]
    ProtocolOverflow { len: u32, max: usize },

    /// IPC control-region magic or version did not match. Fails at
    /// startup, before any slot is claimed.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Backpressure: the ring has no room for another record. Surfaces as
    /// a suspension on the async send path, or as this error on the
    /// non-blocking one.
    #[error("ring is full")]
    RingFull,
}

pub type Result<T> = std::result::Result<T, Error>;
