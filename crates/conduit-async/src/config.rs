//! Tuning knobs for [`crate::RingReceiver`]'s polling behavior.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Safety-net interval for the poll timer. The receiver is woken
    /// primarily by `Notify`, so this only matters if a notification is
    /// ever missed or several small sends land before the task is polled.
    pub poll_interval: Duration,
    /// Upper bound on items drained in a single poll, to keep one poll from
    /// starving other tasks when a burst arrives.
    pub batch_hint: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            batch_hint: 64,
        }
    }
}

impl StreamConfig {
    pub fn low_latency() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            batch_hint: 16,
        }
    }

    pub fn high_throughput() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            batch_hint: 256,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_hint(mut self, hint: usize) -> Self {
        self.batch_hint = hint;
        self
    }
}
