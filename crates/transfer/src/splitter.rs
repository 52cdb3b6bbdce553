use std::collections::BTreeSet;
use std::ops::Range;

/// One chunk of a file: its 1-based number and byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub chunk_number: u32,
    pub byte_range: Range<u64>,
}

impl ChunkTask {
    /// Builds the task for `chunk_number` of a file of `total_size` bytes.
    pub fn new(chunk_number: u32, total_size: u64, chunk_size: u32) -> Self {
        Self {
            chunk_number,
            byte_range: range_for(chunk_number, total_size, chunk_size),
        }
    }

    /// Length of the chunk in bytes.
    pub fn len(&self) -> u64 {
        self.byte_range.end - self.byte_range.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of chunks needed for `total_size` bytes: `ceil(total / chunk)`.
///
/// `chunk_size` must be non-zero. Saturates at `u32::MAX`; callers that
/// cannot accept a truncated layout use [`checked_chunk_count`].
pub fn chunk_count(total_size: u64, chunk_size: u32) -> u32 {
    checked_chunk_count(total_size, chunk_size).unwrap_or(u32::MAX)
}

/// Like [`chunk_count`], but `None` when the file needs more than
/// `u32::MAX` chunks.
pub fn checked_chunk_count(total_size: u64, chunk_size: u32) -> Option<u32> {
    u32::try_from(total_size.div_ceil(u64::from(chunk_size))).ok()
}

/// Byte range `[start, end)` of a 1-based chunk number.
///
/// The last chunk may be shorter than `chunk_size`.
pub fn range_for(chunk_number: u32, total_size: u64, chunk_size: u32) -> Range<u64> {
    let size = u64::from(chunk_size);
    let start = (u64::from(chunk_number.saturating_sub(1)) * size).min(total_size);
    let end = (u64::from(chunk_number) * size).min(total_size);
    start..end
}

/// Every chunk of the file, in order.
pub fn chunk_tasks(total_size: u64, chunk_size: u32) -> impl Iterator<Item = ChunkTask> {
    (1..=chunk_count(total_size, chunk_size))
        .map(move |n| ChunkTask::new(n, total_size, chunk_size))
}

/// Chunk numbers in `[1, total_chunks]` not present in `already`, ascending.
pub fn pending_chunks(total_chunks: u32, already: &BTreeSet<u32>) -> Vec<u32> {
    (1..=total_chunks).filter(|n| !already.contains(n)).collect()
}
