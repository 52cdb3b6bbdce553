//! Drives one [`UploadSession`] from start to a terminal state.
//!
//! The sequence is: stat, checksum, initiate (adopting any chunks the store
//! already holds), bounded transfer of the rest, local verification, then
//! complete. Cancellation is checked between every phase and raced against
//! every network call, so a cancelled session never reaches complete.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chunkup_protocol::{InitiateRequest, UploadStatus};
use chunkup_transfer::{ChunkReader, TransferError, checked_chunk_count, compute_file_checksum};
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{ChunkError, UploadError};
use crate::retry::{RetryPolicy, send_with_retry};
use crate::scheduler::run_bounded;
use crate::session::UploadSession;
use crate::store::RemoteStore;
use crate::transport::ChunkTransport;

/// Runs uploads against one remote store.
#[derive(Clone)]
pub struct UploadDriver {
    store: Arc<dyn RemoteStore>,
    transport: ChunkTransport,
    config: UploadConfig,
}

impl UploadDriver {
    pub fn new(store: Arc<dyn RemoteStore>, config: UploadConfig) -> Self {
        Self {
            transport: ChunkTransport::new(store.clone()),
            store,
            config: config.validate(),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Uploads `path` through `session` and returns the terminal status.
    ///
    /// Never fails: every outcome is recorded on the session. When the
    /// session ends cancelled after the store assigned an id, the store is
    /// asked to discard the partial upload.
    pub async fn drive(&self, session: &UploadSession, path: &Path) -> UploadStatus {
        match self.run(session, path).await {
            Ok(()) => {}
            Err(UploadError::Cancelled) => {
                session.cancel();
            }
            Err(e) => {
                session.fail(&e);
            }
        }

        let status = session.status();
        if status == UploadStatus::Cancelled
            && let Some(server_upload_id) = session.server_upload_id()
        {
            if let Err(e) = self.store.cancel(&server_upload_id).await {
                warn!(
                    upload = %session.upload_id(),
                    server_upload = %server_upload_id,
                    error = %e,
                    "failed to discard cancelled upload on store"
                );
            }
        }
        status
    }

    async fn run(&self, session: &UploadSession, path: &Path) -> Result<(), UploadError> {
        let cancel = session.cancel_token();
        let upload_id = session.upload_id();

        let total_size = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::Checksum(TransferError::Io(e)))?
            .len();
        if total_size > self.config.max_file_size {
            return Err(UploadError::FileTooLarge {
                size: total_size,
                max: self.config.max_file_size,
            });
        }
        let chunk_size = self.config.chunk_size;
        if checked_chunk_count(total_size, chunk_size).is_none() {
            return Err(UploadError::FileTooLarge {
                size: total_size,
                max: u64::from(u32::MAX) * u64::from(chunk_size),
            });
        }
        session.set_layout(total_size, chunk_size);
        info!(
            upload = %upload_id,
            file = %path.display(),
            size = total_size,
            chunks = session.total_chunks(),
            "starting upload"
        );

        let checksum = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = compute_file_checksum(path) => result.map_err(UploadError::Checksum)?,
        };
        debug!(upload = %upload_id, checksum = %checksum, "file hashed");
        session.set_checksum(checksum.clone());

        let request = InitiateRequest {
            filename: session.filename(),
            total_chunks: session.total_chunks(),
            chunk_size,
            total_size,
            file_checksum: Some(checksum),
            mime_type: session.mime_type(),
            metadata: session.metadata(),
        };
        // Not raced against cancel: once the store answers we know its id
        // and can tell it to discard the upload.
        let initiated = self
            .store
            .initiate(&request)
            .await
            .map_err(UploadError::Initiate)?;
        let server_upload_id = initiated.upload_id;
        let pending = session.resume(
            server_upload_id.clone(),
            &initiated.uploaded_chunks,
            initiated.expires_at,
        );
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        info!(
            upload = %upload_id,
            server_upload = %server_upload_id,
            pending = pending.len(),
            "upload initiated"
        );

        let reader = ChunkReader::new(path, total_size, chunk_size);
        let policy = RetryPolicy::new(
            self.config.retry_attempts,
            self.config.retry_base_delay(),
        );
        let reader = &reader;
        let transport = &self.transport;
        let server_id = server_upload_id.as_str();
        let token = &cancel;

        let report = run_bounded(
            pending,
            self.config.concurrency,
            &cancel,
            move |chunk| async move {
                let data = reader
                    .read_chunk(chunk)
                    .await
                    .map_err(|e| ChunkError::Transport(format!("read chunk {chunk}: {e}")))?;
                send_with_retry(transport, server_id, chunk, Bytes::from(data), token, policy)
                    .await
                    .map(|_| ())
            },
            |chunk, _| {
                let held = session.record_chunk(chunk);
                debug!(upload = %upload_id, chunk, held, "chunk stored");
            },
        )
        .await;

        if report.cancelled || cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if !report.failed.is_empty() {
            return Err(UploadError::ChunksExhausted(report.failed));
        }

        session.verify_complete()?;
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let completed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = self.store.complete(&server_upload_id) => result.map_err(UploadError::Complete)?,
        };

        if !session.finish_completed(completed.final_file_id) {
            if session.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            return Err(UploadError::IntegrityMismatch {
                missing: session.missing_chunks(),
            });
        }
        Ok(())
    }
}
