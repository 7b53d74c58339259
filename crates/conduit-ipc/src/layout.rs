//! Shared-memory region layouts.
//!
//! Two kinds of mmap'd region: the control region (one per IPC server,
//! tracking which client slots are occupied and their liveness) and the
//! ring region (one pair per client: `c2s` and `s2c`, each a circular byte
//! buffer carrying length-prefixed frames in the same wire format
//! `conduit_ring::frame` uses over TCP). All multi-byte fields are
//! little-endian by construction: every field here is a `std::sync::atomic`
//! type, which on every platform this crate targets stores its bytes in the
//! machine's native (little-endian) order, and mmap'd memory is only ever
//! read back on the same architecture it was written on.
//!
//! Field types are atomics rather than plain integers because the control
//! region and ring headers are genuinely shared across process boundaries:
//! a plain `u64` read racing a concurrent write in another process is
//! exactly the sort of access `std::sync::atomic` exists to make defined.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8};

/// Magic value stamping a freshly created control region.
pub const CONTROL_MAGIC: u64 = 0x434e44_5f_4354524c; // "CND_CTRL" (truncated to 8 bytes)
/// Magic value stamping a freshly created ring region.
pub const RING_MAGIC: u64 = 0x434e44_5f_52494e47; // "CND_RING" (truncated to 8 bytes)
pub const LAYOUT_VERSION: u32 = 1;

/// Upper bound on simultaneously connected clients per control region.
pub const MAX_CLIENTS: usize = 64;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Empty = 0,
    Joining = 1,
    Live = 2,
    Leaving = 3,
}

impl ClientState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::Joining),
            2 => Some(Self::Live),
            3 => Some(Self::Leaving),
            _ => None,
        }
    }
}

/// One entry in the control region's client-slot table.
#[repr(C)]
pub struct ClientSlot {
    pub state: AtomicU8,
    _pad0: [u8; 7],
    pub client_id: AtomicU64,
    pub last_heartbeat_ticks: AtomicU64,
}

/// The control region: server liveness flag plus the client-slot table.
///
/// A server CAS-creates this at `server_alive = 0`, zeroes the slot table,
/// then sets `server_alive = 1`. A client refuses to connect while
/// `server_alive == 0`, so that it never implicitly creates a server.
#[repr(C)]
pub struct ControlHeader {
    pub magic: AtomicU64,
    pub version: AtomicU32,
    _pad0: [u8; 4],
    pub server_alive: AtomicU8,
    _pad1: [u8; 7],
    pub slots: [ClientSlot; MAX_CLIENTS],
}

impl ControlHeader {
    pub const SIZE: usize = std::mem::size_of::<ControlHeader>();

    /// Initializes a freshly mapped, zero-filled region in place.
    pub fn init(region: &mut [u8]) {
        assert!(region.len() >= Self::SIZE, "control region too small");
        let header = Self::from_bytes(region);
        header.magic.store(CONTROL_MAGIC, std::sync::atomic::Ordering::Relaxed);
        header.version.store(LAYOUT_VERSION, std::sync::atomic::Ordering::Relaxed);
        for slot in &header.slots {
            slot.state.store(ClientState::Empty as u8, std::sync::atomic::Ordering::Relaxed);
            slot.client_id.store(0, std::sync::atomic::Ordering::Relaxed);
            slot.last_heartbeat_ticks.store(0, std::sync::atomic::Ordering::Relaxed);
        }
        header.server_alive.store(1, std::sync::atomic::Ordering::Release);
    }

    /// Reinterprets an existing mapped region. Caller must validate
    /// `magic`/`version` before trusting the result.
    pub fn from_bytes(region: &[u8]) -> &ControlHeader {
        assert!(region.len() >= Self::SIZE, "control region too small");
        unsafe { &*(region.as_ptr().cast::<ControlHeader>()) }
    }
}

/// A ring region's header: byte-stream cursors over a trailing payload
/// area of `capacity` bytes. Producer and consumer cursors are padded onto
/// separate cache lines since one is hammered by the writer and the other
/// by the reader, in different processes.
#[repr(C)]
pub struct RingHeader {
    pub magic: AtomicU64,
    pub version: AtomicU32,
    _pad0: [u8; 4],
    pub capacity: AtomicU64,
    _pad1: [u8; 104],
    pub producer_cursor: AtomicU64,
    _pad2: [u8; 120],
    pub consumer_cursor: AtomicU64,
    _pad3: [u8; 120],
}

impl RingHeader {
    pub const SIZE: usize = std::mem::size_of::<RingHeader>();

    pub fn region_size(capacity: usize) -> usize {
        Self::SIZE + capacity
    }

    /// Initializes a freshly mapped, zero-filled region with `capacity`
    /// bytes of payload area following the header.
    pub fn init(region: &mut [u8], capacity: usize) {
        assert!(region.len() >= Self::region_size(capacity), "ring region too small");
        let header = Self::from_bytes(region);
        header.capacity.store(capacity as u64, std::sync::atomic::Ordering::Relaxed);
        header.producer_cursor.store(0, std::sync::atomic::Ordering::Relaxed);
        header.consumer_cursor.store(0, std::sync::atomic::Ordering::Relaxed);
        header.version.store(LAYOUT_VERSION, std::sync::atomic::Ordering::Relaxed);
        header.magic.store(RING_MAGIC, std::sync::atomic::Ordering::Release);
    }

    pub fn from_bytes(region: &[u8]) -> &RingHeader {
        assert!(region.len() >= Self::SIZE, "ring region too small");
        unsafe { &*(region.as_ptr().cast::<RingHeader>()) }
    }

    /// The payload area trailing this header, within the same mapping.
    pub fn payload(region: &[u8]) -> &[u8] {
        &region[Self::SIZE..]
    }

    /// Mutable counterpart of [`Self::payload`], for the writer side.
    pub fn payload_mut(region: &mut [u8]) -> &mut [u8] {
        &mut region[Self::SIZE..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_header_round_trips_through_bytes() {
        let mut region = vec![0u8; ControlHeader::SIZE];
        ControlHeader::init(&mut region);
        let header = ControlHeader::from_bytes(&region);
        assert_eq!(header.magic.load(std::sync::atomic::Ordering::Relaxed), CONTROL_MAGIC);
        assert_eq!(header.server_alive.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(
            header.slots[0].state.load(std::sync::atomic::Ordering::Relaxed),
            ClientState::Empty as u8
        );
    }

    #[test]
    fn ring_header_round_trips_through_bytes() {
        let mut region = vec![0u8; RingHeader::region_size(4096)];
        RingHeader::init(&mut region, 4096);
        let header = RingHeader::from_bytes(&region);
        assert_eq!(header.magic.load(std::sync::atomic::Ordering::Relaxed), RING_MAGIC);
        assert_eq!(header.capacity.load(std::sync::atomic::Ordering::Relaxed), 4096);
    }
}
