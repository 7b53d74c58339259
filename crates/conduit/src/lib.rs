//! One import path over every `conduit` backend.
//!
//! Each backend crate (`conduit_tcp`, `conduit_udp`, `conduit_ipc`,
//! `conduit_inproc`) exposes its own plain constructor; this crate
//! re-exports the contract types (`Endpoint`, `Acceptor`, `Error`,
//! `Payload`) and those constructors so calling code only ever imports
//! `conduit`, plus a [`Backend`] enum and [`connect`] helper for callers
//! that want to pick a backend at runtime rather than naming a concrete
//! type. There is no fluent Builder here — that surface, and the sample
//! programs/benchmark harness that would exercise it, are external
//! collaborators this crate doesn't implement.

use std::net::SocketAddr;
use std::sync::Arc;

pub use conduit_core::{
    Acceptor, Endpoint, Error, OnClientConnected, OnClientDisconnected, OnConnected,
    OnDisconnected, OnReceived, Payload, Result,
};

pub use conduit_inproc::{InprocAcceptor, InprocConfig, InprocEndpoint};
pub use conduit_ipc::{IpcConfig, IpcEndpoint, Server as IpcServer};
pub use conduit_reconnect::{wrap as reconnect, ConnectFactory, ReconnectConfig, ReconnectEndpoint};
pub use conduit_tcp::{TcpAcceptor, TcpConfig, TcpEndpoint};
pub use conduit_udp::{UdpConfig, UdpEndpoint};

/// Names a backend and the parameters needed to dial it, for callers that
/// want to select a transport at runtime instead of naming a concrete
/// Endpoint type.
#[derive(Debug, Clone)]
pub enum Backend {
    Tcp { addr: SocketAddr, config: TcpConfig },
    Udp { config: UdpConfig },
    Ipc { config: IpcConfig },
}

/// Connects using the backend `target` names, returning one `Arc<dyn
/// Endpoint>` regardless of which concrete type produced it.
///
/// In-process pairs have no "dial an address" step (see
/// [`conduit_inproc::InprocEndpoint::pair`]/`connect`) and so aren't
/// represented here; callers that want that backend use it directly.
pub async fn connect(target: Backend) -> Result<Arc<dyn Endpoint>> {
    match target {
        Backend::Tcp { addr, config } => {
            Ok(Arc::new(TcpEndpoint::connect(addr, config).await?) as Arc<dyn Endpoint>)
        }
        Backend::Udp { config } => {
            Ok(Arc::new(UdpEndpoint::bind(config).await?) as Arc<dyn Endpoint>)
        }
        Backend::Ipc { config } => {
            Ok(Arc::new(IpcEndpoint::connect(config).await?) as Arc<dyn Endpoint>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_backend_connects_through_the_facade() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0", TcpConfig::default())
            .await
            .unwrap();
        let addr = acceptor.local_addr().unwrap();
        acceptor.start().unwrap();

        let endpoint = connect(Backend::Tcp {
            addr,
            config: TcpConfig::default(),
        })
        .await
        .unwrap();
        assert!(!endpoint.is_disposed());
    }
}
