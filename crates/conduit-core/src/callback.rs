//! Shared callback storage.
//!
//! Every backend's Endpoint/Acceptor holds its user-settable callbacks
//! behind a lock, so that replacing a callback after startup takes effect
//! starting with the next event rather than needing a restart. A plain
//! `RwLock` is enough: the read side (firing a callback) is on the hot
//! path but brief, and an `ArcSwap`-style dependency isn't otherwise used
//! anywhere in this workspace's stack.

use std::sync::RwLock;

/// A settable, lock-guarded slot for one callback closure.
pub struct CallbackSlot<F: ?Sized> {
    inner: RwLock<Option<Box<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Replaces the callback. Takes effect for every subsequent `fire`.
    pub fn set(&self, callback: Box<F>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    /// Clears the callback.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Runs `f` with the current callback, if one is set.
    pub fn with<R>(&self, f: impl FnOnce(&F) -> R) -> Option<R> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.as_deref().map(f)
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_the_most_recently_set_callback() {
        let slot: CallbackSlot<dyn Fn(u32) -> u32 + Send + Sync> = CallbackSlot::new();
        assert!(slot.with(|f| f(1)).is_none());

        slot.set(Box::new(|x| x + 1));
        assert_eq!(slot.with(|f| f(1)), Some(2));

        slot.set(Box::new(|x| x * 10));
        assert_eq!(slot.with(|f| f(1)), Some(10));

        slot.clear();
        assert!(slot.with(|f| f(1)).is_none());
    }
}
