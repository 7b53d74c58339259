//! Channel construction: one dedicated ring, one sender, one receiver.

use crate::config::StreamConfig;
use crate::receiver::RingReceiver;
use crate::sender::RingSender;
use crate::shutdown::ShutdownState;
use conduit_ring::{Config, Ring};
use std::sync::Arc;
use tokio::sync::Notify;

/// Builds a [`RingSender`]/[`RingReceiver`] pair over a fresh ring sized by
/// `config`, using the default [`StreamConfig`] for polling behavior.
///
/// # Example
///
/// ```ignore
/// use conduit_async::channel;
/// use conduit_ring::Config;
///
/// let (tx, mut rx) = channel::<u64>(Config::default());
/// tx.send(42).await.unwrap();
/// ```
pub fn channel<T: Send + 'static>(config: Config) -> (RingSender<T>, RingReceiver<T>) {
    channel_with_stream_config(config, StreamConfig::default())
}

/// Like [`channel`], but with explicit control over poll interval and batch
/// size via `stream_config`.
pub fn channel_with_stream_config<T: Send + 'static>(
    config: Config,
    stream_config: StreamConfig,
) -> (RingSender<T>, RingReceiver<T>) {
    let ring = Arc::new(Ring::new(config));
    let data_notify = Arc::new(Notify::new());
    let backpressure_notify = Arc::new(Notify::new());
    let shutdown_state = Arc::new(ShutdownState::new());

    let receiver = RingReceiver::new(
        Arc::clone(&ring),
        Arc::clone(&data_notify),
        Arc::clone(&backpressure_notify),
        Arc::clone(&shutdown_state),
        stream_config,
    );

    let sender = RingSender::new(ring, data_notify, backpressure_notify, shutdown_state);

    (sender, receiver)
}
