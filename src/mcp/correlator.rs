//! Request/response correlation over the one-way event stream.
//!
//! Each outbound request gets a fresh id and a one-shot completion slot. The
//! listener task resolves slots as responses arrive; callers wait on their
//! receiver with a timeout.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::oneshot;

use super::error::{McpError, Result};
use super::types::ResponseEnvelope;

type PendingMap = HashMap<u64, oneshot::Sender<ResponseEnvelope>>;

/// Pending-request table keyed by correlation id.
#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<PendingMap>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    /// Ids start at 0 (taken by the `initialize` handshake) and are never
    /// reused.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    // Critical sections never span an await, so a std mutex is enough. A
    // poisoned map is still structurally valid.
    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next id and its completion slot.
    pub fn register(&self) -> (u64, oneshot::Receiver<ResponseEnvelope>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);
        (id, rx)
    }

    /// Complete the slot registered under `id`.
    ///
    /// Returns `false` when nothing is pending for `id` (already resolved,
    /// timed out, or never issued).
    pub fn resolve(&self, id: u64, value: ResponseEnvelope) -> bool {
        let Some(tx) = self.pending().remove(&id) else {
            return false;
        };
        // The waiter may have given up between our remove and this send.
        tx.send(value).is_ok()
    }

    /// Drop the registration for `id` without completing it.
    pub fn cancel(&self, id: u64) {
        self.pending().remove(&id);
    }

    /// Drop every pending registration. Waiters observe [`McpError::Cancelled`].
    pub fn clear(&self) {
        self.pending().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Guard that drops the registration for `id` when it goes out of scope,
    /// so a caller abandoning its wait does not leave a stale slot behind.
    pub fn guard(&self, id: u64) -> PendingGuard<'_> {
        PendingGuard {
            correlator: self,
            id,
        }
    }

    /// Wait for the response to `id`, removing the registration on timeout.
    pub async fn wait(
        &self,
        id: u64,
        rx: oneshot::Receiver<ResponseEnvelope>,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(McpError::Cancelled { id }),
            Err(_) => {
                self.cancel(id);
                Err(McpError::Timeout { id, timeout })
            }
        }
    }
}

/// Returned by [`Correlator::guard`].
#[derive(Debug)]
pub struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // No-op once the slot was resolved or timed out.
        self.correlator.cancel(self.id);
    }
}
