use conduit_core::Error;
use conduit_ring::FrameError;

/// Internal error shape before it collapses into [`conduit_core::Error`].
///
/// Kept narrow and `thiserror`-derived like the rest of the workspace's
/// error enums (`conduit_ring::FrameError`, `conduit_async::StreamError`);
/// every variant has a direct `Error` counterpart so call sites never match
/// on this type directly.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TcpError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<TcpError> for Error {
    fn from(err: TcpError) -> Self {
        match err {
            TcpError::PayloadTooLarge { len, max } => Error::PayloadTooLarge { len, max },
            TcpError::Frame(FrameError::Overflow { len, max }) => {
                Error::ProtocolOverflow { len, max }
            }
            TcpError::Io(io) => Error::TransportFault(io),
        }
    }
}
