use crate::Ring;
use std::mem::MaybeUninit;

/// A writable window into a [`Ring`], returned by `reserve(n)`.
///
/// The window may be shorter than `n` if it would otherwise wrap past the
/// end of the backing buffer — a reservation only ever spans a contiguous
/// run of slots. Check [`len`](Self::len) rather than assuming the full
/// request was granted.
///
/// Nothing written here is visible to the consumer until [`commit`](Self::commit)
/// (or [`commit_n`](Self::commit_n)) runs.
pub struct Reservation<'a, T> {
    slice: &'a mut [MaybeUninit<T>],
    ring_ptr: *const Ring<T>,
    len: usize,
}

impl<'a, T> Reservation<'a, T> {
    pub(crate) fn new(slice: &'a mut [MaybeUninit<T>], ring_ptr: *const Ring<T>) -> Self {
        let len = slice.len();
        Self {
            slice,
            ring_ptr,
            len,
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [MaybeUninit<T>] {
        self.slice
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Publishes every reserved slot.
    pub fn commit(self) {
        let len = self.len;
        self.commit_n(len);
    }

    /// Publishes only the first `n` of the reserved slots — the rest go
    /// unwritten and the ring's tail doesn't advance over them.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the number of reserved slots.
    pub fn commit_n(self, n: usize) {
        assert!(n <= self.len, "cannot commit more than reserved");
        // SAFETY: ring_ptr was handed to us by the same Ring that produced
        // this reservation, which outlives it.
        unsafe {
            let ring = &*self.ring_ptr;
            ring.commit_internal(n);
        }
    }
}
