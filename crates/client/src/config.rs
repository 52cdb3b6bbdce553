//! Tunables for the upload pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use chunkup_transfer::DEFAULT_CHUNK_SIZE;

/// Upload pipeline configuration.
///
/// Every field has a serde default so partial JSON documents work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per chunk.
    pub chunk_size: u32,
    /// Maximum chunk transfers in flight per upload.
    pub concurrency: usize,
    /// Attempts per chunk before giving up (including the first).
    pub retry_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * base` before the next try.
    pub retry_base_delay_ms: u64,
    /// How long a finished upload stays visible in the registry.
    pub retention_ms: u64,
    /// Files larger than this are rejected before hashing.
    pub max_file_size: u64,
    /// Per-request timeout for the HTTP store.
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 3,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            retention_ms: 3000,
            max_file_size: 1024 * 1024 * 1024,
            request_timeout_secs: 300,
        }
    }
}

impl UploadConfig {
    /// Replaces zero values that would stall or divide by zero.
    pub fn validate(mut self) -> Self {
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        self.concurrency = self.concurrency.max(1);
        self.retry_attempts = self.retry_attempts.max(1);
        self
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
