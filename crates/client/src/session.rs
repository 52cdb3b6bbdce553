//! Per-upload state and its progress stream.
//!
//! An [`UploadSession`] owns everything observers may ask about one upload.
//! All mutation goes through its methods, each of which publishes a fresh
//! [`ProgressSnapshot`] on the session's `watch` channel while still holding
//! the state lock, so subscribers see transitions in order and never miss the
//! terminal one.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use chunkup_protocol::{ProgressSnapshot, UploadMetadata, UploadStatus};
use chunkup_transfer::{TransferRate, chunk_count, pending_chunks, progress_percent, range_for};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::UploadError;

/// One upload, from `start` until it is evicted.
pub struct UploadSession {
    inner: RwLock<SessionInner>,
    cancel: CancellationToken,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

struct SessionInner {
    upload_id: String,
    server_upload_id: Option<String>,
    filename: String,
    mime_type: Option<String>,
    metadata: UploadMetadata,
    total_size: u64,
    chunk_size: u32,
    total_chunks: u32,
    uploaded_chunks: BTreeSet<u32>,
    uploaded_bytes: u64,
    status: UploadStatus,
    started_at: Instant,
    error: Option<String>,
    checksum: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    final_file_id: Option<Uuid>,
    /// Bytes sent in this run; starts when the transfer phase does.
    rate: Option<TransferRate>,
    speed: f64,
    eta: f64,
}

impl SessionInner {
    fn progress(&self) -> f64 {
        if self.status == UploadStatus::Completed {
            100.0
        } else {
            progress_percent(self.uploaded_chunks.len() as u32, self.total_chunks)
        }
    }

    fn chunk_len(&self, chunk_number: u32) -> u64 {
        let range = range_for(chunk_number, self.total_size, self.chunk_size);
        range.end.saturating_sub(range.start)
    }

    fn refresh_rate(&mut self) {
        let Some(rate) = &self.rate else { return };
        self.speed = rate.bytes_per_second();
        let remaining = self.total_size.saturating_sub(self.uploaded_bytes);
        self.eta = TransferRate::eta_seconds(remaining, self.speed);
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            upload_id: self.upload_id.clone(),
            filename: self.filename.clone(),
            progress: self.progress(),
            status: self.status,
            speed_bytes_per_sec: self.speed,
            eta_seconds: if self.status.is_terminal() { 0.0 } else { self.eta },
            error: self.error.clone(),
        }
    }

    fn is_full(&self) -> bool {
        self.uploaded_chunks.len() as u32 == self.total_chunks
    }
}

impl UploadSession {
    /// Creates a session in `Uploading` with nothing transferred yet.
    pub fn new(
        upload_id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
        metadata: UploadMetadata,
    ) -> Self {
        let upload_id = upload_id.into();
        let filename = filename.into();
        let (progress_tx, _) = watch::channel(ProgressSnapshot::initial(&upload_id, &filename));
        Self {
            inner: RwLock::new(SessionInner {
                upload_id,
                server_upload_id: None,
                filename,
                mime_type,
                metadata,
                total_size: 0,
                chunk_size: 0,
                total_chunks: 0,
                uploaded_chunks: BTreeSet::new(),
                uploaded_bytes: 0,
                status: UploadStatus::Uploading,
                started_at: Instant::now(),
                error: None,
                checksum: None,
                expires_at: None,
                final_file_id: None,
                rate: None,
                speed: 0.0,
                eta: 0.0,
            }),
            cancel: CancellationToken::new(),
            progress_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &SessionInner) {
        self.progress_tx.send_replace(inner.snapshot());
    }

    /// Records the file's size and how it will be split.
    pub fn set_layout(&self, total_size: u64, chunk_size: u32) {
        let mut s = self.write();
        s.total_size = total_size;
        s.chunk_size = chunk_size;
        s.total_chunks = chunk_count(total_size, chunk_size);
    }

    pub fn set_checksum(&self, checksum: String) {
        self.write().checksum = Some(checksum);
    }

    /// Adopts the server's view after initiate and returns the chunks still
    /// to send, ascending.
    ///
    /// Chunk numbers outside `1..=total_chunks` are dropped.
    pub fn resume(
        &self,
        server_upload_id: String,
        already_uploaded: &[u32],
        expires_at: DateTime<Utc>,
    ) -> Vec<u32> {
        let mut s = self.write();
        let total = s.total_chunks;
        for &chunk in already_uploaded {
            if chunk == 0 || chunk > total {
                warn!(upload = %s.upload_id, chunk, total, "ignoring out-of-range chunk reported by store");
                continue;
            }
            if s.uploaded_chunks.insert(chunk) {
                let len = s.chunk_len(chunk);
                s.uploaded_bytes += len;
            }
        }
        if !s.uploaded_chunks.is_empty() {
            info!(
                upload = %s.upload_id,
                server_upload = %server_upload_id,
                resumed = s.uploaded_chunks.len(),
                total,
                "resuming upload"
            );
        }
        s.server_upload_id = Some(server_upload_id);
        s.expires_at = Some(expires_at);
        s.rate = Some(TransferRate::start());
        let pending = pending_chunks(total, &s.uploaded_chunks);
        self.publish(&s);
        pending
    }

    /// Marks `chunk_number` acknowledged and publishes progress.
    ///
    /// Returns the number of chunks now held by the store. Ignored once the
    /// session is terminal.
    pub fn record_chunk(&self, chunk_number: u32) -> usize {
        let mut s = self.write();
        if s.status.is_terminal() || chunk_number == 0 || chunk_number > s.total_chunks {
            return s.uploaded_chunks.len();
        }
        if s.uploaded_chunks.insert(chunk_number) {
            let len = s.chunk_len(chunk_number);
            s.uploaded_bytes += len;
            if let Some(rate) = s.rate.as_mut() {
                rate.add(len);
            }
        }
        s.refresh_rate();
        self.publish(&s);
        s.uploaded_chunks.len()
    }

    /// Chunk numbers not yet acknowledged, ascending.
    pub fn missing_chunks(&self) -> Vec<u32> {
        let s = self.read();
        pending_chunks(s.total_chunks, &s.uploaded_chunks)
    }

    /// Checks that every chunk in `1..=total_chunks` was acknowledged.
    pub fn verify_complete(&self) -> Result<(), UploadError> {
        let missing = self.missing_chunks();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::IntegrityMismatch { missing })
        }
    }

    /// Moves to `Completed` with progress forced to 100.
    ///
    /// Refused (returns `false`) unless the session is still uploading and
    /// holds every chunk.
    pub fn finish_completed(&self, final_file_id: Uuid) -> bool {
        let mut s = self.write();
        if s.status != UploadStatus::Uploading || !s.is_full() || self.cancel.is_cancelled() {
            return false;
        }
        s.status = UploadStatus::Completed;
        s.final_file_id = Some(final_file_id);
        s.eta = 0.0;
        info!(upload = %s.upload_id, file_id = %final_file_id, "upload completed");
        self.publish(&s);
        true
    }

    /// Moves to `Error`. No-op once terminal.
    pub fn fail(&self, error: &UploadError) -> bool {
        let mut s = self.write();
        if s.status.is_terminal() {
            return false;
        }
        s.status = UploadStatus::Error;
        s.error = Some(error.to_string());
        tracing::error!(upload = %s.upload_id, error = %error, "upload failed");
        self.publish(&s);
        true
    }

    /// Signals the token and moves to `Cancelled`.
    ///
    /// The token is signalled even when the session is already terminal.
    /// Returns whether the status changed.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel();
        let mut s = self.write();
        if s.status.is_terminal() {
            return false;
        }
        s.status = UploadStatus::Cancelled;
        info!(upload = %s.upload_id, "upload cancelled");
        self.publish(&s);
        true
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress_tx.borrow().clone()
    }

    /// Subscribes to progress; the receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn upload_id(&self) -> String {
        self.read().upload_id.clone()
    }

    pub fn server_upload_id(&self) -> Option<String> {
        self.read().server_upload_id.clone()
    }

    pub fn filename(&self) -> String {
        self.read().filename.clone()
    }

    pub fn mime_type(&self) -> Option<String> {
        self.read().mime_type.clone()
    }

    pub fn metadata(&self) -> UploadMetadata {
        self.read().metadata.clone()
    }

    pub fn status(&self) -> UploadStatus {
        self.read().status
    }

    pub fn total_size(&self) -> u64 {
        self.read().total_size
    }

    pub fn chunk_size(&self) -> u32 {
        self.read().chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.read().total_chunks
    }

    pub fn uploaded_chunks(&self) -> BTreeSet<u32> {
        self.read().uploaded_chunks.clone()
    }

    pub fn started_at(&self) -> Instant {
        self.read().started_at
    }

    pub fn checksum(&self) -> Option<String> {
        self.read().checksum.clone()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.read().expires_at
    }

    pub fn final_file_id(&self) -> Option<Uuid> {
        self.read().final_file_id
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}
