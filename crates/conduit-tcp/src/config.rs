/// Tuning knobs for a TCP [`crate::TcpEndpoint`] or [`crate::TcpAcceptor`].
///
/// Defaults favor low latency over memory footprint: Nagle disabled,
/// 1 MiB OS send/receive buffers, and an 8 KiB frame/slice size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConfig {
    /// Size in bytes of each pooled send/receive slice, and therefore the
    /// largest payload `send`/`send_async` will accept (`buffer_size - 4`
    /// once the length prefix is subtracted).
    pub buffer_size: usize,
    /// Number of slices held by the burst-send pool, i.e. how many
    /// concurrent `send_burst` callers can have a frame in flight without
    /// contending for a buffer.
    pub parallelism: usize,
    /// Backlog passed to the listening socket. Acceptor-only; ignored by
    /// `connect`.
    pub backlog: u32,
    /// Size in bytes requested for the OS socket send/receive buffers.
    pub os_buffer_size: usize,
}

impl TcpConfig {
    pub const DEFAULT_BUFFER_SIZE: usize = 8192;
    pub const DEFAULT_PARALLELISM: usize = 8;
    pub const DEFAULT_BACKLOG: u32 = 1024;
    pub const DEFAULT_OS_BUFFER_SIZE: usize = 1024 * 1024;

    /// # Panics
    ///
    /// Panics if `buffer_size` is not large enough to hold the 4-byte
    /// length prefix plus at least one payload byte, or if `parallelism`
    /// is zero.
    pub const fn new(buffer_size: usize, parallelism: usize, backlog: u32) -> Self {
        assert!(buffer_size > 4, "buffer_size must leave room for a payload");
        assert!(parallelism > 0, "parallelism must be non-zero");
        Self {
            buffer_size,
            parallelism,
            backlog,
            os_buffer_size: Self::DEFAULT_OS_BUFFER_SIZE,
        }
    }

    #[must_use]
    pub const fn with_os_buffer_size(mut self, os_buffer_size: usize) -> Self {
        self.os_buffer_size = os_buffer_size;
        self
    }

    pub(crate) fn max_payload(self) -> usize {
        self.buffer_size - 4
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_BUFFER_SIZE,
            Self::DEFAULT_PARALLELISM,
            Self::DEFAULT_BACKLOG,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = TcpConfig::default();
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.backlog, 1024);
        assert_eq!(config.max_payload(), 8188);
    }

    #[test]
    #[should_panic(expected = "buffer_size")]
    fn rejects_buffer_too_small_for_header() {
        TcpConfig::new(4, 1, 128);
    }
}
