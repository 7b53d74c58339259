//! Async sender implementing `futures::Sink`.

use crate::error::StreamError;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_data_notified, debug_assert_item_preserved};
use crate::shutdown::ShutdownState;
use conduit_ring::Ring;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;

use futures_core::Future;
use futures_sink::Sink;
use pin_project_lite::pin_project;

pin_project! {
    /// The write half of a ring-backed channel. Implements `futures::Sink`
    /// with backpressure: `poll_ready` returns `Pending` while the ring has
    /// no room, and resumes once the receiver signals it has drained some.
    ///
    /// `RingSender` does not implement `Clone` — a ring has exactly one
    /// writer, and that invariant is enforced by construction rather than
    /// checked at runtime.
    pub struct RingSender<T> {
        ring: Arc<Ring<T>>,
        data_notify: Arc<Notify>,
        backpressure_notify: Arc<Notify>,
        shutdown_state: Arc<ShutdownState>,
        pending_item: Option<T>,
    }
}

impl<T: Send + 'static> RingSender<T> {
    pub(crate) fn new(
        ring: Arc<Ring<T>>,
        data_notify: Arc<Notify>,
        backpressure_notify: Arc<Notify>,
        shutdown_state: Arc<ShutdownState>,
    ) -> Self {
        Self {
            ring,
            data_notify,
            backpressure_notify,
            shutdown_state,
            pending_item: None,
        }
    }

    /// Sends an item without waiting. Returns the item back on failure —
    /// either the ring is full, or the channel is closed.
    pub fn try_send(&self, item: T) -> Result<(), T> {
        use std::mem::MaybeUninit;

        if self.shutdown_state.is_closed() || self.ring.is_closed() {
            #[cfg(debug_assertions)]
            debug_assert_item_preserved!(true, true);
            return Err(item);
        }

        if let Some(mut reservation) = self.ring.reserve(1) {
            reservation.as_mut_slice()[0] = MaybeUninit::new(item);
            reservation.commit();
            self.data_notify.notify_one();
            #[cfg(debug_assertions)]
            debug_assert_data_notified!(true, true);
            Ok(())
        } else {
            #[cfg(debug_assertions)]
            debug_assert_item_preserved!(true, true);
            Err(item)
        }
    }

    /// Sends an item, waiting for ring space if necessary.
    pub async fn send(&self, item: T) -> Result<(), StreamError> {
        use std::mem::MaybeUninit;

        let mut item = Some(item);

        loop {
            if self.shutdown_state.is_closed() || self.ring.is_closed() {
                return Err(StreamError::Closed);
            }

            if let Some(mut reservation) = self.ring.reserve(1) {
                reservation.as_mut_slice()[0] = MaybeUninit::new(item.take().unwrap());
                reservation.commit();
                self.data_notify.notify_one();
                #[cfg(debug_assertions)]
                debug_assert_data_notified!(true, true);
                return Ok(());
            }

            #[cfg(debug_assertions)]
            debug_assert_item_preserved!(true, item.is_some());

            // The receiver calls backpressure_notify.notify_waiters() after
            // every drain, which wakes every sender blocked here to retry.
            self.backpressure_notify.notified().await;

            if self.shutdown_state.is_closed() {
                return Err(StreamError::Closed);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown_state.is_closed() || self.ring.is_closed()
    }

    pub fn close(&self) {
        self.ring.close();
    }
}

impl<T: Send + 'static> Sink<T> for RingSender<T> {
    type Error = StreamError;

    /// If a previous `start_send` left an item pending (ring was full),
    /// this tries to flush it before reporting readiness.
    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();

        if this.shutdown_state.is_closed() || this.ring.is_closed() {
            return Poll::Ready(Err(StreamError::Closed));
        }

        if let Some(item) = this.pending_item.take() {
            use std::mem::MaybeUninit;

            if let Some(mut reservation) = this.ring.reserve(1) {
                reservation.as_mut_slice()[0] = MaybeUninit::new(item);
                reservation.commit();
                this.data_notify.notify_one();
                return Poll::Ready(Ok(()));
            }

            *this.pending_item = Some(item);
            let notified = this.backpressure_notify.notified();
            tokio::pin!(notified);
            return match notified.poll(cx) {
                Poll::Ready(()) => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            };
        }

        Poll::Ready(Ok(()))
    }

    /// Never blocks: reserves and commits immediately if there's room,
    /// otherwise stashes `item` in `pending_item` for the next `poll_ready`
    /// or `poll_flush` to retry.
    fn start_send(self: Pin<&mut Self>, item: T) -> Result<(), Self::Error> {
        let this = self.project();

        if this.shutdown_state.is_closed() || this.ring.is_closed() {
            return Err(StreamError::Closed);
        }

        use std::mem::MaybeUninit;

        if let Some(mut reservation) = this.ring.reserve(1) {
            reservation.as_mut_slice()[0] = MaybeUninit::new(item);
            reservation.commit();
            this.data_notify.notify_one();
            Ok(())
        } else {
            *this.pending_item = Some(item);
            Ok(())
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();

        if this.shutdown_state.is_closed() || this.ring.is_closed() {
            return Poll::Ready(Err(StreamError::Closed));
        }

        if let Some(item) = this.pending_item.take() {
            use std::mem::MaybeUninit;

            if let Some(mut reservation) = this.ring.reserve(1) {
                reservation.as_mut_slice()[0] = MaybeUninit::new(item);
                reservation.commit();
                this.data_notify.notify_one();
                return Poll::Ready(Ok(()));
            }

            *this.pending_item = Some(item);
            let notified = this.backpressure_notify.notified();
            tokio::pin!(notified);
            return match notified.poll(cx) {
                Poll::Ready(()) => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            };
        }

        Poll::Ready(Ok(()))
    }

    /// Flushes any pending item, then closes this sender's ring. Other
    /// senders and the receiver are unaffected — a ring has exactly one
    /// writer, so "close the sink" only ever means "close my half."
    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.as_mut().poll_flush(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        let this = self.project();
        this.ring.close();
        Poll::Ready(Ok(()))
    }
}

impl<T: Send + Clone + 'static> RingSender<T> {
    /// `send`, but clones `item` on each retry instead of moving it once —
    /// useful when the caller already has the value behind a shared
    /// reference and doesn't want to restructure around `Option::take`.
    pub async fn send_cloned(&self, item: T) -> Result<(), StreamError> {
        use std::mem::MaybeUninit;

        loop {
            if self.shutdown_state.is_closed() || self.ring.is_closed() {
                return Err(StreamError::Closed);
            }

            if let Some(mut reservation) = self.ring.reserve(1) {
                reservation.as_mut_slice()[0] = MaybeUninit::new(item);
                reservation.commit();
                self.data_notify.notify_one();
                return Ok(());
            }

            self.backpressure_notify.notified().await;

            if self.shutdown_state.is_closed() {
                return Err(StreamError::Closed);
            }
        }
    }
}
