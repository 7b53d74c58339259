//! Debug-only assertion macros for the sender/receiver handshake.

/// Draining items must be followed by a backpressure wakeup, or a blocked
/// sender could wait forever on a ring that actually has room again.
macro_rules! debug_assert_backpressure_signaled {
    ($drained:expr, $signaled:expr) => {
        debug_assert!(
            $drained == 0 || $signaled,
            "drained {} items but did not signal backpressure relief",
            $drained
        )
    };
}

/// Shutdown must fully drain before the stream reports `None`.
macro_rules! debug_assert_shutdown_drained {
    ($shutdown_initiated:expr, $drain_complete:expr) => {
        debug_assert!(
            !$shutdown_initiated || $drain_complete,
            "shutdown initiated but drain not complete"
        )
    };
}

/// A failed `try_send`/backpressure path must hand the item back rather
/// than drop it.
macro_rules! debug_assert_item_preserved {
    ($reserve_failed:expr, $item_returned:expr) => {
        debug_assert!(
            !$reserve_failed || $item_returned,
            "reserve failed but item was not returned to caller"
        )
    };
}

// A RingSender is backed by exactly one ring and is never Clone — enforced
// at compile time, not worth a runtime check.

/// A successful send must wake the receiver, or the data could sit
/// unnoticed until the poll-timer safety net eventually catches it.
macro_rules! debug_assert_data_notified {
    ($send_success:expr, $notified:expr) => {
        debug_assert!(
            !$send_success || $notified,
            "send succeeded but data_notify was not called"
        )
    };
}

/// Triggering shutdown must actually deliver the oneshot signal.
macro_rules! debug_assert_shutdown_signaled {
    ($shutdown_called:expr, $signal_sent:expr) => {
        debug_assert!(
            !$shutdown_called || $signal_sent,
            "shutdown called but signal was not sent"
        )
    };
}

/// Shutdown must wake anyone blocked on backpressure so they can observe
/// the closed state instead of hanging.
macro_rules! debug_assert_senders_woken {
    ($shutdown:expr, $woken:expr) => {
        debug_assert!(
            !$shutdown || $woken,
            "shutdown but blocked senders were not woken"
        )
    };
}

pub(crate) use debug_assert_backpressure_signaled;
pub(crate) use debug_assert_data_notified;
pub(crate) use debug_assert_item_preserved;
pub(crate) use debug_assert_senders_woken;
pub(crate) use debug_assert_shutdown_drained;
pub(crate) use debug_assert_shutdown_signaled;
