//! The contract shared by every `conduit` backend: the `Endpoint`/`Acceptor`
//! traits, the `Payload` byte-view newtype, and the centralized error
//! taxonomy every backend's internal error converts into.
//!
//! Nothing in this crate touches a socket, a ring, or a filesystem — it is
//! the seam a `conduit_tcp`, `conduit_ipc`, `conduit_inproc`, `conduit_udp`,
//! or `conduit_reconnect` Endpoint is implemented against, so calling code
//! can hold one `Box<dyn Endpoint>` regardless of which backend produced it.

mod callback;
mod endpoint;
mod error;
mod payload;

pub use callback::CallbackSlot;
pub use endpoint::{
    Acceptor, Endpoint, OnClientConnected, OnClientDisconnected, OnConnected, OnDisconnected,
    OnReceived,
};
pub use error::{Error, Result};
pub use payload::Payload;
