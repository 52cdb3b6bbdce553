//! Wire types shared between the upload client and the remote store.
//!
//! Field names follow the store's snake_case JSON API.

pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ChunkUploadResponse, ChunkedUploadStatus, CompleteResponse, InitiateRequest,
    InitiateResponse,
};
pub use types::{FileCategory, ProgressSnapshot, UploadMetadata, UploadStatus};
