//! Heap-resident in-process transport backend for `conduit`.
//!
//! The degenerate case of the IPC backend without OS memory mapping: two
//! `conduit_async` ring channels stand in for the mmap'd `c2s`/`s2c` rings,
//! and a process-wide name registry stands in for the mmap'd control
//! region's client-slot discovery. This path is the canonical reference
//! for exercising the ring layer's behavior without any OS transport.

mod acceptor;
mod endpoint;
mod registry;

pub use acceptor::InprocAcceptor;
pub use endpoint::InprocEndpoint;

/// In-process backends have no OS-level framing or buffer-size knobs to
/// configure; the ring's [`conduit_ring::Config`] (capacity, batching) is
/// the only tunable, so it doubles as this backend's config type directly
/// rather than wrapping it in a distinct struct.
pub use conduit_ring::Config as InprocConfig;
