//! Auto-reconnecting `Endpoint` wrapper.
//!
//! Wraps a connect *factory* — anything producing a fresh `Arc<dyn Endpoint>`
//! on demand — with retry-with-backoff reconnection, so callers can hold one
//! `Endpoint` handle across however many underlying connect attempts and
//! drops it actually takes. One long-lived task drives the whole lifecycle,
//! started once in [`wrap`] and torn down exactly once on `dispose`: a
//! per-attempt task would leak on every reconnect race, so there is exactly
//! one task for the wrapper's entire lifetime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::{
    CallbackSlot, Endpoint, Error, OnConnected, OnDisconnected, OnReceived, Payload, Result,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A factory that attempts one connection per call. `conduit_tcp::connect`,
/// `conduit_ipc::IpcEndpoint::connect`, and friends all fit this shape once
/// wrapped in a closure capturing their config.
pub type ConnectFactory =
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<Arc<dyn Endpoint>>> + Send>> + Send + Sync;

/// Backoff schedule for reconnect attempts: `delay(n) = min(base * 2^n, max)`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Connected,
    Disposed,
}

struct Inner {
    factory: Arc<ConnectFactory>,
    config: ReconnectConfig,
    phase: StdMutex<Phase>,
    current: StdMutex<Option<Arc<dyn Endpoint>>>,
    on_received: CallbackSlot<OnReceived>,
    on_connected: CallbackSlot<OnConnected>,
    on_disconnected: CallbackSlot<OnDisconnected>,
    disposed: AtomicBool,
    drive_task: StdMutex<Option<JoinHandle<()>>>,
}

/// An `Endpoint` handle backed by a factory that is retried with backoff
/// until it succeeds, and re-run every time the current connection drops.
pub struct ReconnectEndpoint {
    inner: Arc<Inner>,
}

impl Clone for ReconnectEndpoint {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ReconnectEndpoint {
    /// True once the current factory attempt has succeeded and the
    /// underlying endpoint is wired up; false while reconnecting or after
    /// `dispose`.
    pub fn is_connected(&self) -> bool {
        *self.inner.phase.lock().unwrap_or_else(|e| e.into_inner()) == Phase::Connected
    }
}

/// Wraps `factory` with auto-reconnect, starting the first connection
/// attempt immediately in the background.
pub fn wrap<F, Fut>(factory: F, config: ReconnectConfig) -> ReconnectEndpoint
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Endpoint>>> + Send + 'static,
{
    let factory: Arc<ConnectFactory> = Arc::new(move || Box::pin(factory()));
    let inner = Arc::new(Inner {
        factory,
        config,
        phase: StdMutex::new(Phase::Connecting),
        current: StdMutex::new(None),
        on_received: CallbackSlot::new(),
        on_connected: CallbackSlot::new(),
        on_disconnected: CallbackSlot::new(),
        disposed: AtomicBool::new(false),
        drive_task: StdMutex::new(None),
    });
    let task = tokio::spawn(drive(Arc::clone(&inner)));
    *inner.drive_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    ReconnectEndpoint { inner }
}

fn handle(inner: &Arc<Inner>) -> ReconnectEndpoint {
    ReconnectEndpoint {
        inner: Arc::clone(inner),
    }
}

async fn drive(inner: Arc<Inner>) {
    let mut attempt: u32 = 0;
    loop {
        if inner.disposed.load(Ordering::Acquire) {
            return;
        }
        *inner.phase.lock().unwrap_or_else(|e| e.into_inner()) = Phase::Connecting;

        let connected = (inner.factory)().await;
        let endpoint = match connected {
            Ok(endpoint) => endpoint,
            Err(err) => {
                let delay = inner.config.delay_for(attempt);
                attempt = attempt.saturating_add(1);
                tracing::warn!(attempt, ?delay, error = %err, "reconnect attempt failed");
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        attempt = 0;

        let dropped = Arc::new(Notify::new());
        let inner_for_recv = Arc::clone(&inner);
        let wrapper_for_recv = handle(&inner);
        endpoint.set_on_received(Box::new(move |_ep, frame| {
            inner_for_recv.on_received.with(|cb| cb(&wrapper_for_recv, frame));
        }));
        let dropped_for_disc = Arc::clone(&dropped);
        endpoint.set_on_disconnected(Box::new(move |_ep| {
            dropped_for_disc.notify_one();
        }));

        *inner.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&endpoint));
        *inner.phase.lock().unwrap_or_else(|e| e.into_inner()) = Phase::Connected;
        inner.on_connected.with(|cb| cb(&handle(&inner)));

        dropped.notified().await;

        if inner.disposed.load(Ordering::Acquire) {
            return;
        }
        *inner.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
        inner.on_disconnected.with(|cb| cb(&handle(&inner)));
    }
}

#[async_trait]
impl Endpoint for ReconnectEndpoint {
    fn set_on_received(&self, callback: Box<OnReceived>) {
        self.inner.on_received.set(callback);
    }

    fn set_on_connected(&self, callback: Box<OnConnected>) {
        self.inner.on_connected.set(callback);
    }

    fn set_on_disconnected(&self, callback: Box<OnDisconnected>) {
        self.inner.on_disconnected.set(callback);
    }

    fn send(&self, payload: &[u8]) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let current = self
            .inner
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match current {
            Some(endpoint) => endpoint.send(payload),
            None => Err(Error::ConnectionFailed {
                reason: "reconnecting".into(),
            }),
        }
    }

    async fn send_async(&self, payload: Payload) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let current = self
            .inner
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match current {
            Some(endpoint) => endpoint.send_async(payload).await,
            None => Err(Error::ConnectionFailed {
                reason: "reconnecting".into(),
            }),
        }
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.inner.phase.lock().unwrap_or_else(|e| e.into_inner()) = Phase::Disposed;
        if let Some(task) = self
            .inner
            .drive_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        if let Some(endpoint) = self
            .inner
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            endpoint.dispose();
        }
        self.inner.on_disconnected.with(|cb| cb(self));
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    struct StubEndpoint;

    #[async_trait]
    impl Endpoint for StubEndpoint {
        fn set_on_received(&self, _callback: Box<OnReceived>) {}
        fn set_on_connected(&self, _callback: Box<OnConnected>) {}
        fn set_on_disconnected(&self, _callback: Box<OnDisconnected>) {}
        fn send(&self, _payload: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn send_async(&self, _payload: Payload) -> Result<()> {
            Ok(())
        }
        fn dispose(&self) {}
        fn is_disposed(&self) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_factory = Arc::clone(&attempts);
        let observed: Arc<StdMutex<Vec<Duration>>> = Arc::new(StdMutex::new(Vec::new()));
        let observed_for_factory = Arc::clone(&observed);
        let start = Instant::now();

        let config = ReconnectConfig::new(Duration::from_millis(100), Duration::from_millis(400));
        let reconnecting = wrap(
            move || {
                let attempts = Arc::clone(&attempts_for_factory);
                let observed = Arc::clone(&observed_for_factory);
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    observed.lock().unwrap().push(start.elapsed());
                    if n < 2 {
                        Err(Error::ConnectionFailed {
                            reason: "simulated failure".into(),
                        })
                    } else {
                        Ok(Arc::new(StubEndpoint) as Arc<dyn Endpoint>)
                    }
                }
            },
            config,
        );

        // 3rd attempt (index 2) succeeds; observe it happens, with the
        // 2nd and 3rd attempts delayed ~100ms and ~200ms after the first.
        for _ in 0..50 {
            if attempts.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::advance(Duration::from_millis(50)).await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let observed = observed.lock().unwrap().clone();
        assert_eq!(observed.len(), 3);
        assert!(observed[1] - observed[0] >= Duration::from_millis(100));
        assert!(observed[2] - observed[1] >= Duration::from_millis(200));

        reconnecting.dispose();
    }
}
