//! Bounded retry with linear backoff.
//!
//! After failed attempt `n` the policy waits `n * base_delay`, so with the
//! defaults (3 attempts, 1 s) a chunk gets tried at t=0, t≈1 s and t≈3 s.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ChunkError;
use crate::transport::ChunkTransport;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `op` until it succeeds, fails with [`ChunkError::Cancelled`], or
    /// runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. Cancellation also
    /// interrupts the backoff sleep.
    pub async fn run<F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<u32, ChunkError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), ChunkError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=max_attempts {
            match op(attempt).await {
                Ok(()) => return Ok(attempt),
                Err(ChunkError::Cancelled) => return Err(ChunkError::Cancelled),
                Err(ChunkError::Transport(reason)) => last = reason,
                Err(e @ ChunkError::Exhausted { .. }) => last = e.to_string(),
            }

            if attempt < max_attempts {
                let delay = self.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    reason = %last,
                    "attempt failed, backing off"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ChunkError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(ChunkError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }
}

/// Sends one chunk through `transport`, retrying per `policy`.
///
/// Returns the number of attempts it took.
pub async fn send_with_retry(
    transport: &ChunkTransport,
    upload_id: &str,
    chunk_number: u32,
    data: Bytes,
    cancel: &CancellationToken,
    policy: RetryPolicy,
) -> Result<u32, ChunkError> {
    policy
        .run(cancel, |_| transport.send(upload_id, chunk_number, data.clone(), cancel))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(100))
    }

    #[test]
    fn backoff_is_linear() {
        let p = policy(3);
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_linear_waits() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let attempts = policy(3)
            .run(&CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(ChunkError::Transport("flaky".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        // 100 ms after attempt 1, 200 ms after attempt 2.
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_carries_last_reason() {
        let result = policy(2)
            .run(&CancellationToken::new(), |attempt| async move {
                Err(ChunkError::Transport(format!("boom {attempt}")))
            })
            .await;

        assert_eq!(
            result,
            Err(ChunkError::Exhausted {
                attempts: 2,
                last: "boom 2".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_failure_short_circuits() {
        let calls = AtomicU32::new(0);
        let result = policy(5)
            .run(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ChunkError::Cancelled) }
            })
            .await;

        assert_eq!(result, Err(ChunkError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_retrying() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            c.cancel();
        });

        let result = policy(3)
            .run(&cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ChunkError::Transport("down".into())) }
            })
            .await;

        assert_eq!(result, Err(ChunkError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_with_retry_recovers_flaky_chunk() {
        let store = Arc::new(MockStore::new());
        store.fail_chunk(4, 2);
        let transport = ChunkTransport::new(store.clone());

        let attempts = send_with_retry(
            &transport,
            "srv-1",
            4,
            Bytes::from_static(b"chunk"),
            &CancellationToken::new(),
            policy(3),
        )
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(store.attempts_for(4), 3);
        assert!(store.received().contains(&4));
    }

    #[tokio::test(start_paused = true)]
    async fn send_with_retry_gives_up() {
        let store = Arc::new(MockStore::new());
        store.fail_chunk(1, u32::MAX);
        let transport = ChunkTransport::new(store.clone());

        let err = send_with_retry(
            &transport,
            "srv-1",
            1,
            Bytes::from_static(b"chunk"),
            &CancellationToken::new(),
            policy(3),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ChunkError::Exhausted { attempts: 3, .. }));
        assert_eq!(store.attempts_for(1), 3);
    }
}
