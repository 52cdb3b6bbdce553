use std::io::{Read, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::splitter::{ChunkTask, chunk_count};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
///
/// Blocking; see [`compute_file_checksum`] for the async variant.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes the file on the blocking pool so the runtime stays responsive.
pub async fn compute_file_checksum(path: &Path) -> Result<String, TransferError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads individual chunks of a file by number.
///
/// Each read opens its own handle, so concurrent chunk uploads never share
/// a file cursor.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    path: PathBuf,
    file_size: u64,
    chunk_size: u32,
}

impl ChunkReader {
    /// Creates a reader for `path`, whose size is already known.
    ///
    /// `chunk_size` must be non-zero.
    pub fn new(path: impl Into<PathBuf>, file_size: u64, chunk_size: u32) -> Self {
        Self {
            path: path.into(),
            file_size,
            chunk_size,
        }
    }

    /// Stats `path` and builds a reader for it.
    pub async fn open(path: impl Into<PathBuf>, chunk_size: u32) -> Result<Self, TransferError> {
        let path = path.into();
        let file_size = tokio::fs::metadata(&path).await?.len();
        Ok(Self::new(path, file_size, chunk_size))
    }

    /// Returns the task describing `chunk_number`.
    pub fn task(&self, chunk_number: u32) -> Result<ChunkTask, TransferError> {
        let total = self.total_chunks();
        if chunk_number == 0 || chunk_number > total {
            return Err(TransferError::ChunkOutOfRange {
                chunk: chunk_number,
                total,
            });
        }
        Ok(ChunkTask::new(chunk_number, self.file_size, self.chunk_size))
    }

    /// Reads the bytes of `chunk_number`.
    pub async fn read_chunk(&self, chunk_number: u32) -> Result<Vec<u8>, TransferError> {
        let task = self.task(chunk_number)?;
        self.read_task(&task).await
    }

    /// Reads exactly the byte range of `task`.
    pub async fn read_task(&self, task: &ChunkTask) -> Result<Vec<u8>, TransferError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(task.byte_range.start)).await?;
        let mut buf = vec![0u8; task.len() as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Total number of chunks in the file.
    pub fn total_chunks(&self) -> u32 {
        chunk_count(self.file_size, self.chunk_size)
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
