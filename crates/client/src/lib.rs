//! Chunked upload orchestration.
//!
//! [`UploadRegistry::start`] spawns one driver per file. The driver hashes
//! the file, opens (or resumes) the upload on a [`RemoteStore`], sends the
//! missing chunks through a bounded scheduler with per-chunk retries, checks
//! that every chunk was acknowledged, and asks the store to assemble the
//! result. Observers follow each upload through a `watch` stream of
//! [`ProgressSnapshot`](chunkup_protocol::ProgressSnapshot)s.

pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod upload;

#[cfg(test)]
mod testing;

pub use config::UploadConfig;
pub use error::{ChunkError, StoreError, UploadError};
pub use http::HttpStore;
pub use registry::{UploadCounts, UploadRegistry};
pub use retry::{RetryPolicy, send_with_retry};
pub use scheduler::{ScheduleReport, run_bounded};
pub use session::UploadSession;
pub use store::{RemoteStore, StoreFuture};
pub use transport::ChunkTransport;
pub use types::UploadRequest;
pub use upload::UploadDriver;
