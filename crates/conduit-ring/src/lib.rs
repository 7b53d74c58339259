//! conduit-ring — single-producer/single-consumer ring buffer, pooled
//! buffers, and frame codec.
//!
//! Every `conduit` transport backend is built on a dedicated [`Ring<T>`] per
//! direction: one writer, one reader, lock-free on both sides. This crate
//! also carries the pieces that sit next to the ring in most backends — a
//! pooled fixed-size byte-slice manager for zero-allocation I/O, and the
//! length-prefixed frame codec shared by the TCP and IPC wire formats.
//!
//! # Key properties
//!
//! - 128-byte cache-line padding between producer-hot and consumer-hot
//!   fields
//! - batch consumption with a single cursor update for N items
//! - adaptive backoff (spin → yield → give up) for blocking callers
//! - zero-copy reserve/commit for the write side
//!
//! # Example
//!
//! ```
//! use conduit_ring::{Config, Ring};
//!
//! let ring = Ring::<u64>::new(Config::default());
//!
//! ring.push(42);
//! if let Some(mut reservation) = ring.reserve(1) {
//!     reservation.as_mut_slice()[0].write(43);
//!     reservation.commit();
//! }
//!
//! let mut total = 0u64;
//! ring.consume_batch(|item| total += item);
//! assert_eq!(total, 85);
//! ```

mod backoff;
mod config;
pub mod frame;
pub(crate) mod invariants;
mod metrics;
pub mod pool;
mod reservation;
mod ring;

pub use backoff::Backoff;
pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use frame::{FrameError, FrameParser, MAX_FRAME_DEFAULT};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pool::{BufferPool, PooledSlice};
pub use reservation::Reservation;
pub use ring::{CacheAligned, Ring};
