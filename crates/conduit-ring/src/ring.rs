//! The single-producer/single-consumer ring buffer every transport backend
//! is built from, plus the cache-line padding it depends on.
//!
//! A `Ring<T>` is a fixed-capacity circular buffer shared between exactly one
//! writer and one reader. The writer reserves a window of slots, fills them,
//! then publishes the new tail; the reader observes the published tail, reads
//! whatever became available, and advances its own head once done. Neither
//! side ever touches the other's cursor directly — they only publish and
//! observe, which is what lets both sides run lock-free.

use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic, debug_assert_no_wrap,
};
use crate::{Backoff, Config, Metrics, Reservation};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Pads its contents out to a 128-byte boundary.
///
/// A ring's producer-owned cursor and consumer-owned cursor sit in the same
/// struct; without padding they'd land on the same 64-byte cache line and
/// every update from one side would bounce the line out from under the
/// other, turning two independent atomics into a false-sharing bottleneck.
/// 128 bytes rather than 64 because several CPU families prefetch adjacent
/// lines in pairs, which would otherwise undo the padding.
#[repr(align(128))]
#[derive(Debug, Default)]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

/// A lock-free single-producer/single-consumer ring buffer.
///
/// Cursors are unbounded monotonic `u64` counters rather than indices
/// wrapped to the buffer's size — the slot index is only computed
/// (`cursor & mask`) at the point of access. That sidesteps the ABA problem
/// a wrapped index would have: two writes would need to land 2^64 cursor
/// values apart to collide, which never happens inside a process lifetime
/// at any realistic throughput.
///
/// Synchronization is two cursors and nothing else:
/// - the producer publishes by storing a new `tail` with `Release`,
///   ordering every slot write that preceded it;
/// - the consumer reads that same `tail` with `Acquire` to see those writes,
///   then publishes its own progress by storing `head` with `Release`;
/// - each side also keeps a private, unsynchronized cache of the other's
///   cursor (`cached_head`/`cached_tail`) so the common case — there is
///   already enough room, or already something to read — never touches the
///   other side's cache line at all.
#[repr(C)]
pub struct Ring<T> {
    tail: CacheAligned<AtomicU64>,
    cached_head: CacheAligned<UnsafeCell<u64>>,

    head: CacheAligned<AtomicU64>,
    cached_tail: CacheAligned<UnsafeCell<u64>>,

    active: CacheAligned<AtomicBool>,
    closed: AtomicBool,
    metrics: Metrics,
    config: Config,

    /// Fixed-size backing storage. A `Box<[T]>` rather than `Vec<T>`: the
    /// slot count never changes after construction, so there's no reason to
    /// carry a capacity field distinct from the length.
    buffer: UnsafeCell<Box<[MaybeUninit<T>]>>,
}

// Every field is either an atomic or an UnsafeCell with exactly one writer
// (producer for cached_head and producer-side buffer slots, consumer for
// cached_tail), so Ring<T> can cross threads whenever T can.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub fn new(config: Config) -> Self {
        let capacity = config.capacity();
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);

        Self {
            tail: CacheAligned::new(AtomicU64::new(0)),
            cached_head: CacheAligned::new(UnsafeCell::new(0)),
            head: CacheAligned::new(AtomicU64::new(0)),
            cached_tail: CacheAligned::new(UnsafeCell::new(0)),
            active: CacheAligned::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            metrics: Metrics::new(),
            config,
            buffer: UnsafeCell::new(buffer.into_boxed_slice()),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.config.mask()
    }

    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Raw producer cursor, for backends (e.g. the IPC ring header) that
    /// need to publish it somewhere other than this struct.
    #[inline]
    pub fn producer_cursor(&self) -> u64 {
        self.tail.load(Ordering::Acquire)
    }

    #[inline]
    pub fn consumer_cursor(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Reserves up to `n` slots for zero-copy writes. Returns `None` if the
    /// ring doesn't currently have room for `n` slots, or `n` is 0 or
    /// exceeds the ring's total capacity.
    ///
    /// The reservation may cover fewer than `n` slots if the window wraps
    /// past the end of the backing buffer — a reservation only ever spans a
    /// contiguous run. Check `reservation.len()` and loop if you need an
    /// exact count committed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn reserve(&self, n: usize) -> Option<Reservation<'_, T>> {
        if n == 0 || n > self.capacity() {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);

        // SAFETY: cached_head has exactly one writer — this producer-side path.
        let cached_head = unsafe { *self.cached_head.get() };
        let space = self
            .capacity()
            .saturating_sub(tail.wrapping_sub(cached_head) as usize);
        if space >= n {
            return Some(self.build_reservation(tail, n));
        }

        // Cache was stale; refresh from the consumer's published head.
        let head = self.head.load(Ordering::Acquire);
        unsafe {
            *self.cached_head.get() = head;
        }
        let space = self.capacity().saturating_sub(tail.wrapping_sub(head) as usize);
        if space < n {
            return None;
        }
        Some(self.build_reservation(tail, n))
    }

    /// `reserve`, retrying with [`Backoff`] until space appears or the ring
    /// closes.
    pub fn reserve_with_backoff(&self, n: usize) -> Option<Reservation<'_, T>> {
        let mut backoff = Backoff::new();
        while !backoff.is_completed() {
            if let Some(r) = self.reserve(n) {
                return Some(r);
            }
            if self.is_closed() {
                return None;
            }
            backoff.snooze();
        }
        None
    }

    fn build_reservation(&self, tail: u64, n: usize) -> Reservation<'_, T> {
        let mask = self.mask();
        let idx = (tail as usize) & mask;
        let contiguous = n.min(self.capacity() - idx);

        // SAFETY: [idx, idx+contiguous) sits beyond the published tail, so
        // the consumer hasn't seen these slots yet and won't read them; the
        // producer is the only writer here, and the reservation's commit()
        // publishes via a Release store to tail.
        let slice = unsafe {
            let buffer = &mut *self.buffer.get();
            &mut buffer[idx..idx + contiguous]
        };
        Reservation::new(slice, self as *const Self)
    }

    pub(crate) fn commit_internal(&self, n: usize) {
        let tail = self.tail.load(Ordering::Relaxed);
        let new_tail = tail.wrapping_add(n as u64);
        let head = self.head.load(Ordering::Relaxed);

        debug_assert_bounded_count!(new_tail.wrapping_sub(head) as usize, self.capacity());
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_no_wrap!("tail", tail, new_tail);

        self.tail.store(new_tail, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_sent(n as u64);
            self.metrics.add_batches_sent(1);
        }
    }

    /// Returns a readable slice of whatever is currently available, or
    /// `None` if the ring is empty.
    #[allow(clippy::cast_possible_truncation)]
    pub fn readable(&self) -> Option<&[T]> {
        let head = self.head.load(Ordering::Relaxed);

        // SAFETY: cached_tail has exactly one writer — this consumer-side path.
        let mut cached_tail = unsafe { *self.cached_tail.get() };
        let mut avail = cached_tail.wrapping_sub(head) as usize;

        if avail == 0 {
            cached_tail = self.tail.load(Ordering::Acquire);
            unsafe {
                *self.cached_tail.get() = cached_tail;
            }
            avail = cached_tail.wrapping_sub(head) as usize;
            if avail == 0 {
                return None;
            }
        }

        let mask = self.mask();
        let idx = (head as usize) & mask;
        let contiguous = avail.min(self.capacity() - idx);

        // SAFETY: [head, tail) was published by the producer via a Release
        // store the Acquire load above synchronizes with; only the consumer
        // reads these slots, and the producer won't reuse them until head
        // advances past them.
        unsafe {
            let buffer = &*self.buffer.get();
            Some(std::slice::from_raw_parts(
                buffer[idx..].as_ptr().cast::<T>(),
                contiguous,
            ))
        }
    }

    #[inline]
    pub fn advance(&self, n: usize) {
        let head = self.head.load(Ordering::Relaxed);
        let new_head = head.wrapping_add(n as u64);
        let tail = self.tail.load(Ordering::Relaxed);

        debug_assert_head_not_past_tail!(new_head, tail);
        debug_assert_monotonic!("head", head, new_head);

        self.head.store(new_head, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(n as u64);
            self.metrics.add_batches_received(1);
        }
    }

    /// Drains every currently available item through `handler`, advancing
    /// `head` exactly once for the whole batch rather than once per item.
    /// Prefer this over [`consume_up_to`](Self::consume_up_to) when `T` is
    /// cheap to inspect by reference (e.g. `Copy`).
    #[allow(clippy::cast_possible_truncation)]
    pub fn consume_batch<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while pos != tail {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            // SAFETY: [head, tail) was fully written by the producer and
            // published via the Acquire load on tail above; only the
            // consumer reads these slots, and assume_init_read transfers
            // ownership out so the item's Drop still runs, just after the
            // handler sees it.
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(&item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.head.store(tail, Ordering::Release);
        if self.config.enable_metrics {
            self.metrics.add_messages_received(count as u64);
            self.metrics.add_batches_received(1);
        }
        count
    }

    /// Like [`consume_batch`](Self::consume_batch), but hands the handler
    /// ownership of each item instead of a reference — use this when `T`
    /// holds an allocation and you want to move it onward without cloning.
    #[allow(clippy::cast_possible_truncation)]
    pub fn consume_batch_owned<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while pos != tail {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.head.store(tail, Ordering::Release);
        if self.config.enable_metrics {
            self.metrics.add_messages_received(count as u64);
            self.metrics.add_batches_received(1);
        }
        count
    }

    /// Like [`consume_batch`](Self::consume_batch), but stops after
    /// `max_items` rather than draining everything available — useful when
    /// an unbounded batch could stall the consumer too long.
    #[allow(clippy::cast_possible_truncation)]
    pub fn consume_up_to<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        if max_items == 0 {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let to_consume = avail.min(max_items);
        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while count < to_consume {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(&item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.head.store(head.wrapping_add(count as u64), Ordering::Release);
        if self.config.enable_metrics {
            self.metrics.add_messages_received(count as u64);
            self.metrics.add_batches_received(1);
        }
        count
    }

    /// `consume_up_to` with ownership transfer; see
    /// [`consume_batch_owned`](Self::consume_batch_owned) for when to prefer
    /// the owned variant.
    #[allow(clippy::cast_possible_truncation)]
    pub fn consume_up_to_owned<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        if max_items == 0 {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let to_consume = avail.min(max_items);
        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while count < to_consume {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.head.store(head.wrapping_add(count as u64), Ordering::Release);
        if self.config.enable_metrics {
            self.metrics.add_messages_received(count as u64);
            self.metrics.add_batches_received(1);
        }
        count
    }

    /// Enqueues a single item, returning `false` if the ring has no room.
    #[inline]
    pub fn push(&self, item: T) -> bool {
        self.reserve(1).is_some_and(|mut r| {
            r.as_mut_slice()[0] = MaybeUninit::new(item);
            r.commit();
            true
        })
    }

    pub fn send(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        self.reserve(items.len()).map_or(0, |mut reservation| {
            let slice = reservation.as_mut_slice();
            let n = slice.len();
            for (slot, item) in slice.iter_mut().zip(items) {
                slot.write(*item);
            }
            reservation.commit();
            n
        })
    }

    pub fn recv(&self, out: &mut [T]) -> usize
    where
        T: Copy,
    {
        self.readable().map_or(0, |slice| {
            let n = slice.len().min(out.len());
            out[..n].copy_from_slice(&slice[..n]);
            self.advance(n);
            n
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> crate::MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            crate::MetricsSnapshot::default()
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;
        if count == 0 {
            return;
        }

        let mask = self.mask();
        let buffer = self.buffer.get_mut();
        for i in 0..count {
            let idx = (head as usize).wrapping_add(i) & mask;
            // SAFETY: every slot in [head, tail) was written by the producer
            // and never read out, so it still holds a live T whose
            // destructor has to run here.
            unsafe {
                ptr::drop_in_place(buffer[idx].as_mut_ptr());
            }
        }
    }
}

#[cfg(test)]
mod align_tests {
    use super::CacheAligned;
    use std::mem::{align_of, size_of};

    #[test]
    fn pads_to_128_bytes() {
        assert_eq!(align_of::<CacheAligned<u64>>(), 128);
        assert!(size_of::<CacheAligned<u64>>() >= 128);
    }

    #[test]
    fn two_adjacent_fields_land_on_different_lines() {
        struct Pair {
            a: CacheAligned<u64>,
            b: CacheAligned<u64>,
        }
        let p = Pair {
            a: CacheAligned::new(1),
            b: CacheAligned::new(2),
        };
        let a_addr = std::ptr::addr_of!(p.a) as usize;
        let b_addr = std::ptr::addr_of!(p.b) as usize;
        assert!(b_addr - a_addr >= 128);
    }
}
