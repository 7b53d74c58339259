//! TCP transport backend for `conduit`.
//!
//! [`TcpEndpoint`] dials or wraps one TCP connection; [`TcpAcceptor`]
//! listens and produces one [`TcpEndpoint`] per accepted peer. Both speak
//! the length-prefixed frame codec from `conduit_ring::frame`, so
//! `on_received` always fires with one complete message, regardless of how
//! the bytes happened to arrive off the wire.
//!
//! ```no_run
//! use conduit_core::Endpoint;
//! use conduit_tcp::{TcpConfig, TcpEndpoint};
//!
//! # async fn run() -> conduit_core::Result<()> {
//! let endpoint = TcpEndpoint::connect("127.0.0.1:5555", TcpConfig::default()).await?;
//! endpoint.set_on_received(Box::new(|_endpoint, frame| {
//!     println!("received {} bytes", frame.len());
//! }));
//! endpoint.send(b"ping")?;
//! # Ok(())
//! # }
//! ```

mod acceptor;
mod config;
mod endpoint;
mod error;
mod op;

pub use acceptor::TcpAcceptor;
pub use config::TcpConfig;
pub use endpoint::TcpEndpoint;
