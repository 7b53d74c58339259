//! Shared-memory IPC transport backend for `conduit`.
//!
//! A server [`IpcServer::bind`]s a control region naming the channel; a
//! client [`IpcEndpoint::connect`]s to it, CAS-claiming a slot and mapping
//! a pair of per-client ring regions (`c2s`/`s2c`) for the actual traffic.
//! Clients never implicitly create a server — connecting to a name nobody
//! has bound yet fails with `Error::ConnectionFailed`.
//!
//! ```no_run
//! # async fn run() -> conduit_core::Result<()> {
//! use conduit_core::{Acceptor, Endpoint};
//! use conduit_ipc::{IpcConfig, IpcEndpoint, Server};
//!
//! let config = IpcConfig::new("my-channel");
//! let server = Server::bind(config.clone())?;
//! server.set_on_received(Box::new(|endpoint, frame| {
//!     let _ = endpoint.send(frame);
//! }));
//! server.start()?;
//!
//! let client = IpcEndpoint::connect(config).await?;
//! client.send(b"hello")?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod layout;
mod region;
mod ring;
mod server;

pub use client::IpcEndpoint;
pub use config::IpcConfig;
pub use server::{ClientProxy, IpcServer};

/// Alias matching the rest of the pack's `bind`-style acceptor naming.
pub use server::IpcServer as Server;
