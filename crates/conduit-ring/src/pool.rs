//! Pooled byte-slice buffer manager.
//!
//! Carves one contiguous backing allocation into `capacity` equal-size
//! slices and hands out at most one slice per in-flight I/O operation. The
//! point is the same one [`crate::Reservation`] makes for ring slots: every
//! send/receive on the hot path reuses pinned memory instead of allocating,
//! and a slot is exclusively owned by its renter until it's explicitly
//! returned.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A pool of `slice_size`-byte buffers carved out of one backing allocation.
///
/// Free/in-use bookkeeping is a flat array of `AtomicBool`s rather than a
/// free-list — no pointer-chasing, and the CAS on a slot's flag is the sole
/// synchronization point. Once acquired, a slot is exclusive to its
/// `PooledSlice` until dropped, the same single-writer argument [`crate::Ring`]
/// makes for its own backing buffer.
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    backing: UnsafeCell<Box<[u8]>>,
    in_use: Box<[AtomicBool]>,
    slice_size: usize,
}

// Safety: access to `backing` is partitioned by `in_use` CAS ownership —
// only the thread holding slot `i`'s flag touches bytes `[i*slice_size,
// (i+1)*slice_size)`.
unsafe impl Send for PoolInner {}
unsafe impl Sync for PoolInner {}

impl BufferPool {
    /// Creates a pool of `count` slices, each `slice_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `slice_size` or `count` is zero.
    pub fn new(slice_size: usize, count: usize) -> Self {
        assert!(slice_size > 0, "slice_size must be non-zero");
        assert!(count > 0, "count must be non-zero");

        let backing = vec![0u8; slice_size * count].into_boxed_slice();
        let in_use = (0..count).map(|_| AtomicBool::new(false)).collect();

        Self {
            inner: Arc::new(PoolInner {
                backing: UnsafeCell::new(backing),
                in_use,
                slice_size,
            }),
        }
    }

    /// Size of each slice in this pool.
    pub fn slice_size(&self) -> usize {
        self.inner.slice_size
    }

    /// Total number of slices in this pool.
    pub fn capacity(&self) -> usize {
        self.inner.in_use.len()
    }

    /// Rents a free slice, or `None` if every slice is currently checked out.
    ///
    /// The returned [`PooledSlice`] owns exclusive access to its window of
    /// the backing allocation until dropped, at which point the slice is
    /// automatically returned to the pool.
    pub fn try_rent(&self) -> Option<PooledSlice> {
        for (idx, flag) in self.inner.in_use.iter().enumerate() {
            if flag
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(PooledSlice {
                    pool: Arc::clone(&self.inner),
                    index: idx,
                    len: 0,
                });
            }
        }
        None
    }
}

impl Clone for BufferPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// An exclusively-held slice rented from a [`BufferPool`].
///
/// `len` tracks how many of the slice's bytes currently hold meaningful
/// data (the operation's working window); the full slice is always
/// `slice_size` bytes, restored before the slice returns to the pool.
pub struct PooledSlice {
    pool: Arc<PoolInner>,
    index: usize,
    len: usize,
}

impl PooledSlice {
    fn window(&self) -> (usize, usize) {
        let start = self.index * self.pool.slice_size;
        (start, start + self.pool.slice_size)
    }

    /// Copies `data` into the start of this slice's window.
    ///
    /// Returns `false` without copying if `data` is larger than the pool's
    /// slice size.
    pub fn write(&mut self, data: &[u8]) -> bool {
        if data.len() > self.pool.slice_size {
            return false;
        }
        let (start, _) = self.window();
        // Safety: this slot's `in_use` flag is held by this `PooledSlice`
        // alone (acquired via CAS in `try_rent`, released only on `Drop`),
        // so no other thread touches bytes `[start, start+slice_size)`.
        unsafe {
            let backing = &mut *self.pool.backing.get();
            backing[start..start + data.len()].copy_from_slice(data);
        }
        self.len = data.len();
        true
    }

    /// Reads the current window into `out`, returning the number of bytes
    /// copied (`min(self.len(), out.len())`).
    pub fn read_into(&self, out: &mut [u8]) -> usize {
        let (start, _) = self.window();
        let n = self.len.min(out.len());
        // Safety: same exclusivity argument as `write`.
        unsafe {
            let backing = &*self.pool.backing.get();
            out[..n].copy_from_slice(&backing[start..start + n]);
        }
        n
    }

    /// Borrows the current window as a slice.
    pub fn as_slice(&self) -> &[u8] {
        let (start, _) = self.window();
        // Safety: same exclusivity argument as `write`.
        unsafe {
            let backing = &*self.pool.backing.get();
            &backing[start..start + self.len]
        }
    }

    /// Borrows the full slice capacity as a mutable buffer, e.g. for an OS
    /// read to fill directly. Callers must call `set_len` afterward with
    /// however many bytes were actually written.
    pub fn as_mut_full_slice(&mut self) -> &mut [u8] {
        let (start, end) = self.window();
        // Safety: same exclusivity argument as `write`.
        unsafe {
            let backing = &mut *self.pool.backing.get();
            &mut backing[start..end]
        }
    }

    /// Number of meaningful bytes currently in the window.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Full capacity of the slice, regardless of the current window length.
    pub fn capacity(&self) -> usize {
        self.pool.slice_size
    }

    /// Sets the window length directly, e.g. after an OS read reports how
    /// many bytes landed in the slice.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.pool.slice_size);
        self.len = len.min(self.pool.slice_size);
    }
}

impl Drop for PooledSlice {
    fn drop(&mut self) {
        // Reset the window so the next renter always starts with the full
        // slice_size bytes of working room, not whatever was left over.
        self.len = 0;
        self.pool.in_use[self.index].store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_and_return() {
        let pool = BufferPool::new(64, 2);
        let a = pool.try_rent().unwrap();
        let b = pool.try_rent().unwrap();
        assert!(pool.try_rent().is_none());
        drop(a);
        let c = pool.try_rent().unwrap();
        drop(b);
        drop(c);
    }

    #[test]
    fn write_and_read_roundtrip() {
        let pool = BufferPool::new(16, 1);
        let mut slice = pool.try_rent().unwrap();
        assert!(slice.write(b"hello"));
        assert_eq!(slice.len(), 5);
        let mut out = [0u8; 16];
        let n = slice.read_into(&mut out);
        assert_eq!(&out[..n], b"hello");
        assert_eq!(slice.as_slice(), b"hello");
    }

    #[test]
    fn write_rejects_oversized_payload() {
        let pool = BufferPool::new(4, 1);
        let mut slice = pool.try_rent().unwrap();
        assert!(!slice.write(b"too big"));
        assert_eq!(slice.len(), 0);
    }

    #[test]
    fn exclusive_ownership_until_drop() {
        let pool = BufferPool::new(8, 1);
        let slice = pool.try_rent().unwrap();
        assert!(pool.try_rent().is_none());
        drop(slice);
        assert!(pool.try_rent().is_some());
    }

    #[test]
    fn rent_concurrently_from_many_threads() {
        let pool = BufferPool::new(32, 8);
        std::thread::scope(|s| {
            for i in 0..8 {
                let pool = pool.clone();
                s.spawn(move || {
                    let mut slice = pool.try_rent().expect("pool exhausted");
                    let payload = vec![i as u8; 4];
                    assert!(slice.write(&payload));
                });
            }
        });
        assert_eq!(pool.try_rent().unwrap().capacity(), 32);
    }
}
