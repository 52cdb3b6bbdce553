//! Leaf building blocks for chunked uploads.
//!
//! Nothing in here touches the network: the splitter maps a file size to
//! chunk ranges, the checksum helpers hash whole files, the reader pulls a
//! chunk's bytes off disk, and [`TransferRate`] turns byte counts into
//! speed and ETA figures.

mod chunked;
mod progress;
mod splitter;

pub use chunked::{
    ChunkReader, calculate_file_checksum, checksum_bytes, compute_file_checksum,
};
pub use progress::{TransferRate, progress_percent};
pub use splitter::{
    ChunkTask, checked_chunk_count, chunk_count, chunk_tasks, pending_chunks, range_for,
};

/// Default chunk size: 5 MiB.
///
/// Small enough to stay under typical proxy body limits, large enough that
/// per-request overhead stays negligible.
pub const DEFAULT_CHUNK_SIZE: u32 = 5 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk {chunk} out of range (file has {total} chunks)")]
    ChunkOutOfRange { chunk: u32, total: u32 },

    #[error("background task failed: {0}")]
    Join(String),
}
