use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an IPC [`crate::IpcEndpoint`]/[`crate::IpcServer`] pair.
///
/// `name` identifies the channel; the control region and every per-client
/// ring region are files named after it under `dir`, so two processes that
/// agree on `name` and `dir` find the same shared memory without any other
/// coordination.
#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub name: String,
    pub dir: PathBuf,
    pub ring_capacity: usize,
    pub max_frame: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

pub(crate) const DEFAULT_RING_CAPACITY: usize = 64 * 1024;
pub(crate) const DEFAULT_MAX_FRAME: usize = 8192;

impl IpcConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: std::env::temp_dir(),
            ring_capacity: DEFAULT_RING_CAPACITY,
            max_frame: DEFAULT_MAX_FRAME,
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    pub(crate) fn control_path(&self) -> PathBuf {
        self.dir.join(format!("{}.ctrl", self.name))
    }

    pub(crate) fn ring_path(&self, client_id: u64, direction: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{client_id}.{direction}.ring", self.name))
    }
}
