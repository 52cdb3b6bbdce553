//! Tracks every upload started by this process.
//!
//! The registry map is the only state shared across uploads. Each entry is
//! removed by a follow-up task once the retention window after its
//! terminal state has passed, or right away by [`UploadRegistry::dispose`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chunkup_protocol::{ProgressSnapshot, UploadStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::UploadSession;
use crate::types::UploadRequest;
use crate::upload::UploadDriver;

struct Entry {
    session: Arc<UploadSession>,
    seq: u64,
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Completed and still-pending upload counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    pub completed: usize,
    /// Uploading or failed; failed uploads wait for a retry or dismissal.
    pub pending: usize,
}

/// Starts uploads and answers questions about them.
pub struct UploadRegistry {
    driver: UploadDriver,
    entries: Entries,
    /// Driver tasks; each ends once its upload is terminal and the store
    /// has been told about a cancel.
    drivers: Mutex<Vec<JoinHandle<()>>>,
    next_seq: AtomicU64,
}

impl UploadRegistry {
    pub fn new(driver: UploadDriver) -> Self {
        Self {
            driver,
            entries: Arc::new(Mutex::new(HashMap::new())),
            drivers: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Starts uploading `request` in the background and returns its id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: UploadRequest) -> String {
        let upload_id = Uuid::new_v4().to_string();
        let session = Arc::new(UploadSession::new(
            upload_id.clone(),
            request.display_name(),
            request.mime_type.clone(),
            request.metadata.clone(),
        ));
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).insert(
            upload_id.clone(),
            Entry {
                session: session.clone(),
                seq,
            },
        );
        info!(upload = %upload_id, file = %request.path.display(), "upload queued");

        let driver = self.driver.clone();
        let entries = self.entries.clone();
        let retention = driver.config().retention();
        let handle = tokio::spawn(async move {
            let status = driver.drive(&session, &request.path).await;
            debug!(upload = %session.upload_id(), ?status, "upload finished, retaining");
            tokio::spawn(evict_after(entries, session, retention));
        });

        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        drivers.retain(|h| !h.is_finished());
        drivers.push(handle);

        upload_id
    }

    /// Waits for every driver started so far, including the store cancel a
    /// cancelled upload sends after its terminal snapshot.
    pub async fn wait_idle(&self) {
        let drivers =
            std::mem::take(&mut *self.drivers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in drivers {
            if let Err(e) = handle.await {
                warn!(error = %e, "upload driver task failed");
            }
        }
    }

    fn session(&self, upload_id: &str) -> Option<Arc<UploadSession>> {
        lock(&self.entries).get(upload_id).map(|e| e.session.clone())
    }

    fn sessions_in_start_order(&self) -> Vec<Arc<UploadSession>> {
        let map = lock(&self.entries);
        let mut entries: Vec<&Entry> = map.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.session.clone()).collect()
    }

    /// Progress stream for `upload_id`, starting at its current snapshot.
    pub fn progress_of(&self, upload_id: &str) -> Option<watch::Receiver<ProgressSnapshot>> {
        self.session(upload_id).map(|s| s.subscribe())
    }

    pub fn snapshot(&self, upload_id: &str) -> Option<ProgressSnapshot> {
        self.session(upload_id).map(|s| s.snapshot())
    }

    /// Snapshots of every tracked upload, oldest first.
    ///
    /// Includes finished uploads still inside their retention window.
    pub fn list_active(&self) -> Vec<ProgressSnapshot> {
        self.sessions_in_start_order()
            .iter()
            .map(|s| s.snapshot())
            .collect()
    }

    /// Cancels `upload_id`. Returns `false` if it is unknown or already
    /// finished.
    pub fn cancel(&self, upload_id: &str) -> bool {
        match self.session(upload_id) {
            Some(session) => session.cancel(),
            None => false,
        }
    }

    /// Cancels every running upload and returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self
            .sessions_in_start_order()
            .iter()
            .filter(|s| s.cancel())
            .count();
        if cancelled > 0 {
            info!(cancelled, "cancelled all uploads");
        }
        cancelled
    }

    /// Forgets `upload_id` now, cancelling it first if it is still running.
    pub fn dispose(&self, upload_id: &str) -> bool {
        let removed = lock(&self.entries).remove(upload_id);
        match removed {
            Some(entry) => {
                entry.session.cancel();
                debug!(upload = %upload_id, "upload disposed");
                true
            }
            None => false,
        }
    }

    /// Mean progress over tracked uploads; 0 when there are none.
    pub fn overall_progress(&self) -> f64 {
        let snapshots = self.list_active();
        if snapshots.is_empty() {
            return 0.0;
        }
        snapshots.iter().map(|s| s.progress).sum::<f64>() / snapshots.len() as f64
    }

    pub fn counts(&self) -> UploadCounts {
        self.list_active()
            .iter()
            .fold(UploadCounts::default(), |mut counts, s| {
                match s.status {
                    UploadStatus::Completed => counts.completed += 1,
                    UploadStatus::Uploading | UploadStatus::Error => counts.pending += 1,
                    UploadStatus::Cancelled => {}
                }
                counts
            })
    }

    /// Waits until `upload_id` reaches a terminal state and returns that
    /// snapshot. `None` if the id is unknown.
    pub async fn wait_for_terminal(&self, upload_id: &str) -> Option<ProgressSnapshot> {
        let mut rx = self.progress_of(upload_id)?;
        let snapshot = rx.wait_for(|s| s.status.is_terminal()).await.ok()?;
        Some(snapshot.clone())
    }
}

async fn evict_after(entries: Entries, session: Arc<UploadSession>, retention: Duration) {
    tokio::time::sleep(retention).await;
    let upload_id = session.upload_id();
    let mut map = lock(&entries);
    // Dispose may already have removed it.
    if map
        .get(&upload_id)
        .is_some_and(|e| Arc::ptr_eq(&e.session, &session))
    {
        map.remove(&upload_id);
        debug!(upload = %upload_id, "upload evicted");
    }
}
