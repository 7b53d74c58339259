use std::net::{Ipv4Addr, SocketAddr};

/// Configuration for a [`crate::UdpEndpoint`].
///
/// Covers a local bind address, an optional fixed remote (or multicast
/// group) that `send` targets, and the multicast tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct UdpConfig {
    pub local_addr: SocketAddr,
    /// Destination `send`/`send_async` write to. Required unless every
    /// datagram is addressed by hand via [`crate::UdpEndpoint::send_to`].
    pub remote_addr: Option<SocketAddr>,
    pub allow_broadcast: bool,
    pub multicast_group: Option<Ipv4Addr>,
    pub disable_loopback: bool,
    /// Receive buffer size; also the largest datagram `on_received`
    /// reports in full (larger datagrams are truncated by the OS, matching
    /// plain UDP semantics).
    pub max_datagram: usize,
}

impl UdpConfig {
    pub const DEFAULT_MAX_DATAGRAM: usize = 65_507;

    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            remote_addr: None,
            allow_broadcast: false,
            multicast_group: None,
            disable_loopback: false,
            max_datagram: Self::DEFAULT_MAX_DATAGRAM,
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    #[must_use]
    pub fn with_broadcast(mut self, allow: bool) -> Self {
        self.allow_broadcast = allow;
        self
    }

    #[must_use]
    pub fn with_multicast_group(mut self, group: Ipv4Addr, disable_loopback: bool) -> Self {
        self.multicast_group = Some(group);
        self.disable_loopback = disable_loopback;
        self
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 0)))
    }
}
