//! Shared shutdown coordination between a `RingSender`/`RingReceiver` pair.

#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_senders_woken, debug_assert_shutdown_signaled};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Flags both halves of a channel consult before doing anything that would
/// assume the other side is still around.
#[derive(Debug)]
pub(crate) struct ShutdownState {
    closed: AtomicBool,
    shutdown_initiated: AtomicBool,
}

impl ShutdownState {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn initiate_shutdown(&self) {
        self.shutdown_initiated.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }
}

/// Owned by the receiver; firing it tells the consumer loop to drain and
/// stop, and wakes any sender parked on backpressure so it can see the
/// channel is going down.
pub(crate) struct ShutdownHandle {
    pub(crate) shutdown_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: Arc<ShutdownState>,
    pub(crate) backpressure_notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub(crate) fn trigger(&mut self) {
        self.state.initiate_shutdown();
        self.state.close();

        let signal_sent = if let Some(tx) = self.shutdown_tx.take() {
            tx.send(()).is_ok()
        } else {
            false
        };

        #[cfg(debug_assertions)]
        debug_assert_shutdown_signaled!(true, signal_sent || self.shutdown_tx.is_none());

        self.backpressure_notify.notify_waiters();

        #[cfg(debug_assertions)]
        debug_assert_senders_woken!(true, true);
    }
}

/// A cloneable remote trigger for [`ShutdownHandle::trigger`] — idempotent,
/// so handing it to several tasks is safe; only the first call does
/// anything.
#[derive(Clone)]
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
    backpressure_notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub(crate) fn new(state: Arc<ShutdownState>, backpressure_notify: Arc<Notify>) -> Self {
        Self {
            state,
            backpressure_notify,
        }
    }

    pub fn shutdown(&self) {
        if !self.state.is_shutdown_initiated() {
            self.state.initiate_shutdown();
            self.state.close();
            self.backpressure_notify.notify_waiters();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.is_shutdown_initiated()
    }
}
