//! Async Stream/Sink adapters over a `conduit-ring` ring.
//!
//! Every backend that needs a per-client async byte pipe — IPC, in-process —
//! builds it from one [`RingSender`]/[`RingReceiver`] pair per direction,
//! with backpressure and shutdown handled the same way regardless of what
//! moves through it: `u8` buffers, `bytes::Bytes`, or plain domain values.
//!
//! # Features
//!
//! - **Hybrid polling**: event-driven via `Notify`, with a poll interval as
//!   a safety net
//! - **Backpressure**: a full ring parks the sender until the receiver
//!   signals room
//! - **Graceful shutdown**: drains whatever is in flight before the stream
//!   ends, and composes with `StreamExt::take_until` for external
//!   cancellation
//!
//! # Example
//!
//! ```ignore
//! use conduit_async::channel;
//! use conduit_ring::Config;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = channel::<u64>(Config::default());
//!
//!     tx.send(42).await.unwrap();
//!     tx.send(43).await.unwrap();
//!
//!     while let Some(item) = rx.next().await {
//!         println!("received: {item}");
//!     }
//! }
//! ```

mod channel;
mod config;
mod error;
mod invariants;
mod receiver;
mod sender;
mod shutdown;

pub use channel::{channel, channel_with_stream_config};
pub use config::StreamConfig;
pub use error::StreamError;
pub use receiver::RingReceiver;
pub use sender::RingSender;
pub use shutdown::ShutdownSignal;

pub use tokio_stream::StreamExt;
