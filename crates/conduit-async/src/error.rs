//! Error type for the stream/sink adapter layer.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The ring has no room for another item right now.
    #[error("ring buffer is full")]
    Full,

    /// The channel has been closed.
    #[error("channel is closed")]
    Closed,

    /// The stream has been shut down.
    #[error("stream has been shut down")]
    ShutDown,
}

impl StreamError {
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::ShutDown)
    }
}
