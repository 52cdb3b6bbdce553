//! Upload error types.

use chunkup_transfer::TransferError;

/// Errors returned by a [`RemoteStore`](crate::RemoteStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rejected: {0}")]
    Rejected(String),
}

/// Outcome of sending one chunk.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkError {
    /// Transient failure; the retry policy may try again.
    #[error("chunk transport failed: {0}")]
    Transport(String),

    /// The upload was cancelled while the chunk was in flight.
    #[error("cancelled")]
    Cancelled,

    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Fatal outcome of a whole upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot read file: {0}")]
    Checksum(#[source] TransferError),

    #[error("file is {size} bytes, limit is {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("initiate failed: {0}")]
    Initiate(#[source] StoreError),

    #[error("chunks failed after retries: {}", join_numbers(.0))]
    ChunksExhausted(Vec<u32>),

    #[error("integrity check failed, missing chunks: {}", join_numbers(.missing))]
    IntegrityMismatch { missing: Vec<u32> },

    #[error("complete failed: {0}")]
    Complete(#[source] StoreError),

    /// Not a failure: the caller asked to stop.
    #[error("cancelled")]
    Cancelled,
}

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_lists_chunks() {
        let err = UploadError::ChunksExhausted(vec![2, 5]);
        assert_eq!(err.to_string(), "chunks failed after retries: 2, 5");
    }

    #[test]
    fn integrity_message_lists_missing() {
        let err = UploadError::IntegrityMismatch { missing: vec![4] };
        assert_eq!(err.to_string(), "integrity check failed, missing chunks: 4");
    }

    #[test]
    fn store_errors_are_surfaced_verbatim() {
        let err = UploadError::Initiate(StoreError::Api {
            status: 413,
            body: "too big".into(),
        });
        assert_eq!(err.to_string(), "initiate failed: store error 413: too big");
    }
}
