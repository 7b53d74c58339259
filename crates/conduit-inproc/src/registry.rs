//! Process-wide name registry connecting [`crate::InprocEndpoint::connect`]
//! to a live [`crate::InprocAcceptor`].
//!
//! The heap-only counterpart of the IPC backend's shared-memory discovery:
//! instead of a memory-mapped client-slot table, a live acceptor is looked
//! up by name in a process-wide map, and a connect request is a one-shot
//! handoff of the new pair's client half.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use tokio::sync::{mpsc, oneshot};

use crate::endpoint::InprocEndpoint;

pub(crate) struct ConnectRequest {
    pub(crate) respond: oneshot::Sender<InprocEndpoint>,
}

fn registry() -> &'static Mutex<HashMap<String, mpsc::UnboundedSender<ConnectRequest>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, mpsc::UnboundedSender<ConnectRequest>>>> =
        OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn publish(name: String, sender: mpsc::UnboundedSender<ConnectRequest>) {
    registry()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(name, sender);
}

pub(crate) fn unpublish(name: &str) {
    registry().lock().unwrap_or_else(|e| e.into_inner()).remove(name);
}

pub(crate) fn lookup(name: &str) -> Option<mpsc::UnboundedSender<ConnectRequest>> {
    registry()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(name)
        .cloned()
}
