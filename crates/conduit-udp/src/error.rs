use conduit_core::Error;

#[derive(Debug, thiserror::Error)]
pub(crate) enum UdpError {
    #[error("send() has no configured remote_addr and no destination was given")]
    NoRemote,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<UdpError> for Error {
    fn from(err: UdpError) -> Self {
        match err {
            UdpError::NoRemote => Error::ConnectionFailed {
                reason: "no remote endpoint configured".to_string(),
            },
            UdpError::Io(io) => Error::TransportFault(io),
        }
    }
}
