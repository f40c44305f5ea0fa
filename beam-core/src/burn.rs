//! Burn-after-reading.
//!
//! A completed download of a burn-after-read file registers a pending
//! burn. After the grace window the record is deleted and then the blob.
//! Pending burns are keyed by blob name so a second registration for the
//! same upload is a no-op while the first is still waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beam_blob::BlobStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::record::{Code, FileRecord};
use crate::store::RecordStore;

/// Snapshot of a burn waiting for its grace window.
#[derive(Debug, Clone)]
pub struct PendingBurn {
    pub code: Code,
    pub storage_path: String,
    pub due: Instant,
}

struct Scheduled {
    id: u64,
    record: FileRecord,
    due: Instant,
    cancel: CancellationToken,
}

struct Inner {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    grace: Duration,
    pending: DashMap<String, Scheduled>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    handle: Option<Handle>,
}

/// Schedules deferred deletion of burn-after-read files. Clones share state.
#[derive(Clone)]
pub struct BurnScheduler {
    inner: Arc<Inner>,
}

impl BurnScheduler {
    /// Timers are spawned on the runtime current at construction, if any,
    /// otherwise on whichever runtime is current when a burn is scheduled.
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                records,
                blobs,
                grace,
                pending: DashMap::new(),
                next_id: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
                handle: Handle::try_current().ok(),
            }),
        }
    }

    pub fn grace(&self) -> Duration {
        self.inner.grace
    }

    /// Register a burn for `record`. Returns `false` if one is already pending
    /// for the same upload or the scheduler has been shut down.
    pub fn schedule(&self, record: FileRecord) -> bool {
        if self.inner.shutdown.is_cancelled() {
            debug!(code = %record.code, "burn scheduler stopped, ignoring burn");
            return false;
        }

        let Some(handle) = self.inner.handle.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(code = %record.code, "no runtime available, burn dropped");
            return false;
        };

        let key = record.storage_path.clone();
        let cancel = self.inner.shutdown.child_token();
        let due = Instant::now() + self.inner.grace;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(code = %record.code, "burn already pending");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(Scheduled {
                    id,
                    record: record.clone(),
                    due,
                    cancel: cancel.clone(),
                });
            }
        }

        info!(
            code = %record.code,
            grace_secs = self.inner.grace.as_secs(),
            "burn scheduled"
        );

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(code = %record.code, "burn cancelled");
                    return;
                }
                _ = tokio::time::sleep_until(due) => {}
            }

            inner.fire(&key, id, &cancel, &record).await;
        });

        true
    }

    /// Cancel every pending burn for `code`. Returns how many were dropped.
    pub fn cancel(&self, code: &Code) -> usize {
        let keys: Vec<String> = self
            .inner
            .pending
            .iter()
            .filter(|e| &e.value().record.code == code)
            .map(|e| e.key().clone())
            .collect();

        let mut cancelled = 0;
        for key in keys {
            if let Some((_, entry)) = self.inner.pending.remove(&key) {
                entry.cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_pending(&self, code: &Code) -> bool {
        self.inner
            .pending
            .iter()
            .any(|e| &e.value().record.code == code)
    }

    pub fn pending(&self) -> Vec<PendingBurn> {
        let mut out: Vec<PendingBurn> = self
            .inner
            .pending
            .iter()
            .map(|e| PendingBurn {
                code: e.value().record.code.clone(),
                storage_path: e.key().clone(),
                due: e.value().due,
            })
            .collect();
        out.sort_by_key(|p| p.due);
        out
    }

    /// Drop all pending burns and refuse new ones.
    ///
    /// Burns are not persisted: anything still waiting is left to the
    /// expiry sweep.
    pub fn shutdown(&self) -> usize {
        self.inner.shutdown.cancel();
        let dropped = self.inner.pending.len();
        self.inner.pending.clear();
        if dropped > 0 {
            info!(dropped, "pending burns abandoned at shutdown");
        }
        dropped
    }
}

impl Inner {
    /// Runs once the grace window has elapsed. The entry may have been
    /// cancelled, or replaced by a newer burn for the same key, after the
    /// timer fired; only the entry this timer registered may be consumed.
    async fn fire(&self, key: &str, id: u64, cancel: &CancellationToken, record: &FileRecord) {
        let ours = self.pending.remove_if(key, |_, s| s.id == id).is_some();
        if !ours || cancel.is_cancelled() {
            debug!(code = %record.code, "burn superseded after its timer fired");
            return;
        }
        self.burn(record).await;
    }

    async fn burn(&self, record: &FileRecord) {
        match self.records.delete(record).await {
            Ok(true) => {}
            Ok(false) => debug!(code = %record.code, "record already gone before burn"),
            Err(e) => {
                warn!(code = %record.code, error = %e, "burn failed to delete record");
                return;
            }
        }

        match self.blobs.delete(&record.storage_path).await {
            Ok(()) => info!(code = %record.code, "file burned"),
            Err(e) if e.is_not_found() => {
                debug!(code = %record.code, "blob already gone before burn")
            }
            Err(e) => warn!(
                code = %record.code,
                path = %record.storage_path,
                error = %e,
                "burn could not remove blob, not retried"
            ),
        }
    }
}
