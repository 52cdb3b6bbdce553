//! Remote store abstraction.
//!
//! [`HttpStore`](crate::HttpStore) is the production implementation; tests
//! plug in mocks. Keeping the upload logic behind this trait leaves it free of
//! any HTTP details.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use chunkup_protocol::{
    ChunkUploadResponse, ChunkedUploadStatus, CompleteResponse, InitiateRequest,
    InitiateResponse,
};

use crate::error::StoreError;

/// Boxed future returned by [`RemoteStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// The server side of a chunked upload.
///
/// Implementations must be idempotent per chunk number: sending a chunk the
/// store already holds must leave its state unchanged.
pub trait RemoteStore: Send + Sync {
    /// Opens an upload, or reopens a matching one and reports the chunks it
    /// already holds.
    fn initiate(&self, request: &InitiateRequest) -> StoreFuture<'_, InitiateResponse>;

    /// Stores one chunk.
    fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_number: u32,
        data: Bytes,
    ) -> StoreFuture<'_, ChunkUploadResponse>;

    /// Assembles the chunks into the final file.
    fn complete(&self, upload_id: &str) -> StoreFuture<'_, CompleteResponse>;

    /// Discards partial state. Best effort.
    fn cancel(&self, upload_id: &str) -> StoreFuture<'_, ()>;

    /// Reports what the store holds for an upload.
    fn status(&self, upload_id: &str) -> StoreFuture<'_, ChunkedUploadStatus>;
}
