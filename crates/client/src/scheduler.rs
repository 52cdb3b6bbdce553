//! Bounded fan-out over pending chunks.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ChunkError;

/// What happened to the chunks handed to [`run_bounded`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Chunks whose job succeeded, in completion order.
    pub succeeded: Vec<u32>,
    /// Chunks whose job failed for good, ascending.
    pub failed: Vec<u32>,
    /// The token fired before every chunk was attempted.
    pub cancelled: bool,
}

/// Runs `job` for every chunk in `chunks`, at most `limit` at a time.
///
/// A slot is refilled as soon as any job finishes, not when a whole batch
/// does. Failures do not stop the others; every started job is drained
/// before returning. Once `cancel` fires no new job is started.
///
/// `on_success` is called synchronously, in completion order, with the chunk
/// number and how many jobs have succeeded so far.
pub async fn run_bounded<F, Fut, S>(
    chunks: Vec<u32>,
    limit: usize,
    cancel: &CancellationToken,
    job: F,
    mut on_success: S,
) -> ScheduleReport
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<(), ChunkError>>,
    S: FnMut(u32, usize),
{
    let limit = limit.max(1);
    let job = &job;
    let mut queue = chunks.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut report = ScheduleReport::default();

    loop {
        while in_flight.len() < limit && !cancel.is_cancelled() {
            let Some(chunk) = queue.next() else { break };
            in_flight.push(async move { (chunk, job(chunk).await) });
        }

        let Some((chunk, result)) = in_flight.next().await else {
            break;
        };

        match result {
            Ok(()) => {
                report.succeeded.push(chunk);
                on_success(chunk, report.succeeded.len());
            }
            Err(ChunkError::Cancelled) => {
                debug!(chunk, "chunk abandoned on cancel");
            }
            Err(e) => {
                warn!(chunk, error = %e, "chunk failed");
                report.failed.push(chunk);
            }
        }
    }

    report.cancelled = cancel.is_cancelled();
    report.failed.sort_unstable();
    report
}
