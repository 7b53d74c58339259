//! Async receiver implementing `futures::Stream`.

use crate::config::StreamConfig;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_backpressure_signaled, debug_assert_shutdown_drained};
use crate::shutdown::{ShutdownHandle, ShutdownSignal, ShutdownState};
use conduit_ring::Ring;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{oneshot, Notify};
use tokio::time::{interval, Interval};

use futures_core::{Future, Stream};
use pin_project_lite::pin_project;

pin_project! {
    /// The read half of a ring-backed channel. Implements `futures::Stream`
    /// with a hybrid polling strategy: an event-driven `Notify` wakes the
    /// task as soon as data lands, with a periodic timer as a safety net in
    /// case a notification is ever missed.
    ///
    /// After every drain the receiver calls `notify_waiters()` on its
    /// backpressure `Notify`, waking any sender blocked on a full ring.
    ///
    /// Call [`shutdown`](Self::shutdown) for a graceful stop: the stream
    /// keeps yielding whatever is already buffered, performs one final
    /// drain, then returns `None`.
    pub struct RingReceiver<T> {
        ring: Arc<Ring<T>>,
        data_notify: Arc<Notify>,
        backpressure_notify: Arc<Notify>,
        shutdown_state: Arc<ShutdownState>,
        shutdown_rx: Option<oneshot::Receiver<()>>,
        shutdown_handle: Option<ShutdownHandle>,
        config: StreamConfig,
        #[pin]
        poll_timer: Interval,
        buffer: VecDeque<T>,
        data_pending: bool,
        drain_complete: bool,
    }
}

impl<T: Send + 'static> RingReceiver<T> {
    pub(crate) fn new(
        ring: Arc<Ring<T>>,
        data_notify: Arc<Notify>,
        backpressure_notify: Arc<Notify>,
        shutdown_state: Arc<ShutdownState>,
        config: StreamConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shutdown_handle = ShutdownHandle {
            shutdown_tx: Some(shutdown_tx),
            state: Arc::clone(&shutdown_state),
            backpressure_notify: Arc::clone(&backpressure_notify),
        };

        Self {
            ring,
            data_notify,
            backpressure_notify,
            shutdown_state,
            shutdown_rx: Some(shutdown_rx),
            shutdown_handle: Some(shutdown_handle),
            config: config.clone(),
            poll_timer: interval(config.poll_interval),
            buffer: VecDeque::with_capacity(config.batch_hint),
            data_pending: false,
            drain_complete: false,
        }
    }

    /// Initiates graceful shutdown: keep polling until the stream returns
    /// `None` to receive whatever was still in flight.
    pub fn shutdown(&mut self) {
        if let Some(ref mut handle) = self.shutdown_handle {
            handle.trigger();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_state.is_shutdown_initiated()
    }

    /// A cloneable handle another task can use to trigger shutdown
    /// remotely.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(
            Arc::clone(&self.shutdown_state),
            Arc::clone(&self.backpressure_notify),
        )
    }

    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }
}

impl<T: Send + 'static> Stream for RingReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if let Some(item) = this.buffer.pop_front() {
            return Poll::Ready(Some(item));
        }

        if *this.drain_complete {
            return Poll::Ready(None);
        }

        if let Some(ref mut rx) = this.shutdown_rx {
            match Pin::new(rx).poll(cx) {
                Poll::Ready(_) => {
                    *this.shutdown_rx = None;

                    let mut drained = 0usize;
                    this.ring.consume_batch_owned(|item| {
                        this.buffer.push_back(item);
                        drained += 1;
                    });
                    this.backpressure_notify.notify_waiters();
                    *this.drain_complete = true;

                    #[cfg(debug_assertions)]
                    debug_assert_backpressure_signaled!(drained, true);
                    #[cfg(debug_assertions)]
                    debug_assert_shutdown_drained!(true, *this.drain_complete);

                    if let Some(item) = this.buffer.pop_front() {
                        return Poll::Ready(Some(item));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => {}
            }
        }

        if *this.data_pending {
            *this.data_pending = false;
            let batch_limit = this.config.batch_hint.saturating_sub(this.buffer.len());
            if batch_limit > 0 {
                let mut drained = 0usize;
                this.ring.consume_up_to_owned(batch_limit, |item| {
                    this.buffer.push_back(item);
                    drained += 1;
                });
                let signaled = !this.buffer.is_empty();
                if signaled {
                    this.backpressure_notify.notify_waiters();
                }
                #[cfg(debug_assertions)]
                debug_assert_backpressure_signaled!(drained, signaled || drained == 0);
            }
        }

        if let Some(item) = this.buffer.pop_front() {
            return Poll::Ready(Some(item));
        }

        let data_notified = this.data_notify.notified();
        tokio::pin!(data_notified);

        match data_notified.as_mut().poll(cx) {
            Poll::Ready(()) => {
                *this.data_pending = true;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            Poll::Pending => {}
        }

        match this.poll_timer.as_mut().poll_tick(cx) {
            Poll::Ready(_) => {
                let batch_limit = this.config.batch_hint.saturating_sub(this.buffer.len());
                if batch_limit > 0 {
                    let mut count = 0;
                    this.ring.consume_up_to_owned(batch_limit, |item| {
                        this.buffer.push_back(item);
                        count += 1;
                    });
                    if count > 0 {
                        this.backpressure_notify.notify_waiters();
                        #[cfg(debug_assertions)]
                        debug_assert_backpressure_signaled!(count, true);
                        if let Some(item) = this.buffer.pop_front() {
                            return Poll::Ready(Some(item));
                        }
                    }
                }
            }
            Poll::Pending => {}
        }

        if this.shutdown_state.is_closed() {
            let mut found_any = false;
            this.ring.consume_batch_owned(|item| {
                this.buffer.push_back(item);
                found_any = true;
            });
            if found_any {
                this.backpressure_notify.notify_waiters();
                #[cfg(debug_assertions)]
                debug_assert_backpressure_signaled!(1, true);
                if let Some(item) = this.buffer.pop_front() {
                    return Poll::Ready(Some(item));
                }
            }
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}
