//! In-memory [`RemoteStore`] used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use chunkup_protocol::{
    ChunkUploadResponse, ChunkedUploadStatus, CompleteResponse, InitiateRequest,
    InitiateResponse,
};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{RemoteStore, StoreFuture};

pub(crate) const SERVER_UPLOAD_ID: &str = "srv-1";
pub(crate) const FINAL_FILE_ID: Uuid = Uuid::from_u128(0x42);

/// Scriptable store that records every call.
#[derive(Default)]
pub(crate) struct MockStore {
    already: Mutex<Vec<u32>>,
    fail_initiate: Mutex<bool>,
    fail_complete: Mutex<bool>,
    fail_cancel: Mutex<bool>,
    /// chunk -> remaining failures before it succeeds.
    failures: Mutex<HashMap<u32, u32>>,
    rejected: Mutex<HashSet<u32>>,
    hung: Mutex<HashSet<u32>>,
    delay: Mutex<Duration>,

    hung_entered: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,

    initiate_requests: Mutex<Vec<InitiateRequest>>,
    attempts: Mutex<Vec<u32>>,
    received: Mutex<BTreeMap<u32, usize>>,
    complete_calls: Mutex<Vec<String>>,
    cancel_calls: Mutex<Vec<String>>,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Chunks the store claims to hold on initiate.
    pub(crate) fn with_already(self, chunks: &[u32]) -> Self {
        *self.already.lock().unwrap() = chunks.to_vec();
        self
    }

    pub(crate) fn fail_initiate(&self) {
        *self.fail_initiate.lock().unwrap() = true;
    }

    pub(crate) fn fail_complete(&self) {
        *self.fail_complete.lock().unwrap() = true;
    }

    pub(crate) fn fail_cancel(&self) {
        *self.fail_cancel.lock().unwrap() = true;
    }

    /// Makes `chunk` fail `times` times before succeeding.
    pub(crate) fn fail_chunk(&self, chunk: u32, times: u32) {
        self.failures.lock().unwrap().insert(chunk, times);
    }

    /// Acks `chunk` with `received: false`.
    pub(crate) fn reject_chunk(&self, chunk: u32) {
        self.rejected.lock().unwrap().insert(chunk);
    }

    /// Makes uploads of `chunk` never finish.
    pub(crate) fn hang_chunk(&self, chunk: u32) {
        self.hung.lock().unwrap().insert(chunk);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Resolves once a hung chunk upload has started.
    pub(crate) async fn wait_hung(&self) {
        self.hung_entered.notified().await;
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn initiate_requests(&self) -> Vec<InitiateRequest> {
        self.initiate_requests.lock().unwrap().clone()
    }

    /// Every chunk upload attempt, in call order.
    pub(crate) fn chunk_attempts(&self) -> Vec<u32> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn attempts_for(&self, chunk: u32) -> usize {
        self.chunk_attempts().iter().filter(|&&c| c == chunk).count()
    }

    pub(crate) fn received(&self) -> BTreeSet<u32> {
        self.received.lock().unwrap().keys().copied().collect()
    }

    pub(crate) fn received_len(&self, chunk: u32) -> Option<usize> {
        self.received.lock().unwrap().get(&chunk).copied()
    }

    pub(crate) fn complete_calls(&self) -> usize {
        self.complete_calls.lock().unwrap().len()
    }

    pub(crate) fn cancel_calls(&self) -> Vec<String> {
        self.cancel_calls.lock().unwrap().clone()
    }
}

impl RemoteStore for MockStore {
    fn initiate(&self, request: &InitiateRequest) -> StoreFuture<'_, InitiateResponse> {
        self.initiate_requests.lock().unwrap().push(request.clone());
        Box::pin(async move {
            if *self.fail_initiate.lock().unwrap() {
                return Err(StoreError::Api {
                    status: 500,
                    body: "initiate refused".into(),
                });
            }
            let already = self.already.lock().unwrap().clone();
            {
                let mut received = self.received.lock().unwrap();
                for chunk in &already {
                    received.insert(*chunk, 0);
                }
            }
            Ok(InitiateResponse {
                upload_id: SERVER_UPLOAD_ID.into(),
                expires_at: Utc::now() + chrono::Duration::days(1),
                uploaded_chunks: already,
            })
        })
    }

    fn upload_chunk(
        &self,
        _upload_id: &str,
        chunk_number: u32,
        data: Bytes,
    ) -> StoreFuture<'_, ChunkUploadResponse> {
        Box::pin(async move {
            self.attempts.lock().unwrap().push(chunk_number);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlightGuard(&self.in_flight);

            if self.hung.lock().unwrap().contains(&chunk_number) {
                self.hung_entered.notify_one();
                std::future::pending::<()>().await;
            }

            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(&chunk_number)
                    && *remaining > 0
                {
                    *remaining -= 1;
                    return Err(StoreError::Api {
                        status: 503,
                        body: format!("chunk {chunk_number} dropped"),
                    });
                }
            }

            if self.rejected.lock().unwrap().contains(&chunk_number) {
                return Ok(ChunkUploadResponse {
                    chunk_number,
                    received: false,
                    upload_progress: 0.0,
                    uploaded_chunks: Vec::new(),
                });
            }

            let mut received = self.received.lock().unwrap();
            received.insert(chunk_number, data.len());
            Ok(ChunkUploadResponse {
                chunk_number,
                received: true,
                upload_progress: 0.0,
                uploaded_chunks: received.keys().copied().collect(),
            })
        })
    }

    fn complete(&self, upload_id: &str) -> StoreFuture<'_, CompleteResponse> {
        self.complete_calls.lock().unwrap().push(upload_id.to_string());
        let upload_id = upload_id.to_string();
        Box::pin(async move {
            if *self.fail_complete.lock().unwrap() {
                return Err(StoreError::Api {
                    status: 409,
                    body: "chunks missing".into(),
                });
            }
            Ok(CompleteResponse {
                upload_id,
                final_file_id: FINAL_FILE_ID,
                message: "ok".into(),
            })
        })
    }

    fn cancel(&self, upload_id: &str) -> StoreFuture<'_, ()> {
        self.cancel_calls.lock().unwrap().push(upload_id.to_string());
        Box::pin(async move {
            if *self.fail_cancel.lock().unwrap() {
                return Err(StoreError::Rejected("cancel refused".into()));
            }
            Ok(())
        })
    }

    fn status(&self, upload_id: &str) -> StoreFuture<'_, ChunkedUploadStatus> {
        let upload_id = upload_id.to_string();
        Box::pin(async move {
            let uploaded: Vec<u32> = self.received().into_iter().collect();
            Ok(ChunkedUploadStatus {
                upload_id,
                filename: String::new(),
                total_chunks: uploaded.len() as u32,
                uploaded_chunks: uploaded,
                missing_chunks: Vec::new(),
                progress: 0.0,
                is_completed: self.complete_calls() > 0,
                final_file_id: None,
                created_at: Utc::now(),
                expires_at: Utc::now(),
            })
        })
    }
}
