use conduit_core::Error;
use conduit_ring::FrameError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum IpcError {
    #[error("no IPC server is listening under this name")]
    NoServer,
    #[error("control or ring region has an incompatible magic or version")]
    Mismatch,
    #[error("server has no free client slot available")]
    SlotsExhausted,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<IpcError> for Error {
    fn from(err: IpcError) -> Self {
        match err {
            IpcError::NoServer => Error::ConnectionFailed {
                reason: "no IPC server is listening under this name".into(),
            },
            IpcError::SlotsExhausted => Error::ConnectionFailed {
                reason: "server has no free client slot available".into(),
            },
            IpcError::Mismatch => {
                Error::ProtocolMismatch("control or ring region magic/version mismatch".into())
            }
            IpcError::Frame(FrameError::Overflow { len, max }) => {
                Error::ProtocolOverflow { len, max }
            }
            IpcError::Io(io) => Error::TransportFault(io),
        }
    }
}
