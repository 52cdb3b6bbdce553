//! Single-attempt chunk transport.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ChunkError;
use crate::store::RemoteStore;

/// Sends one chunk to the store, once.
///
/// Retrying is the caller's job (see [`crate::retry`]).
#[derive(Clone)]
pub struct ChunkTransport {
    store: Arc<dyn RemoteStore>,
}

impl ChunkTransport {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Transfers `data` as chunk `chunk_number` of `upload_id`.
    ///
    /// Returns [`ChunkError::Cancelled`] as soon as `cancel` fires, without
    /// waiting for the request to finish.
    pub async fn send(
        &self,
        upload_id: &str,
        chunk_number: u32,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), ChunkError> {
        if cancel.is_cancelled() {
            return Err(ChunkError::Cancelled);
        }

        let len = data.len();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChunkError::Cancelled),
            result = self.store.upload_chunk(upload_id, chunk_number, data) => result,
        };

        match result {
            Ok(ack) if ack.received => {
                trace!(upload = %upload_id, chunk = chunk_number, bytes = len, "chunk acknowledged");
                Ok(())
            }
            Ok(_) => Err(ChunkError::Transport(format!(
                "store did not accept chunk {chunk_number}"
            ))),
            Err(e) => Err(ChunkError::Transport(e.to_string())),
        }
    }
}
