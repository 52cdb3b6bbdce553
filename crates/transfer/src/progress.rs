use std::time::{Duration, Instant};

/// Percentage of chunks acknowledged, in `[0, 100]`.
///
/// An upload with no chunks counts as done only once it is finalized, so it
/// reports 0 here.
pub fn progress_percent(uploaded_chunks: u32, total_chunks: u32) -> f64 {
    if total_chunks == 0 {
        return 0.0;
    }
    (f64::from(uploaded_chunks.min(total_chunks)) / f64::from(total_chunks)) * 100.0
}

/// Average transfer rate since a fixed starting instant.
///
/// Speed is cumulative (`bytes / elapsed`), so a stalled upload slowly
/// decays toward zero instead of jumping around per chunk.
#[derive(Debug, Clone)]
pub struct TransferRate {
    started_at: Instant,
    bytes: u64,
}

impl TransferRate {
    /// Starts measuring now.
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Starts measuring from `started_at`.
    pub fn starting_at(started_at: Instant) -> Self {
        Self {
            started_at,
            bytes: 0,
        }
    }

    /// Records `bytes` more transferred.
    pub fn add(&mut self, bytes: u64) {
        self.bytes = self.bytes.saturating_add(bytes);
    }

    /// Bytes recorded so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Bytes per second over `elapsed`; 0 when nothing elapsed.
    pub fn bytes_per_second_over(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs
    }

    /// Bytes per second since the start.
    pub fn bytes_per_second(&self) -> f64 {
        self.bytes_per_second_over(self.started_at.elapsed())
    }

    /// Seconds to move `remaining_bytes` at `speed`; 0 if speed is 0.
    pub fn eta_seconds(remaining_bytes: u64, speed: f64) -> f64 {
        if speed <= 0.0 {
            return 0.0;
        }
        remaining_bytes as f64 / speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_counts_chunks() {
        assert_eq!(progress_percent(0, 6), 0.0);
        assert_eq!(progress_percent(3, 6), 50.0);
        assert_eq!(progress_percent(6, 6), 100.0);
        assert_eq!(progress_percent(0, 0), 0.0);
        // Never exceeds 100.
        assert_eq!(progress_percent(9, 6), 100.0);
    }

    #[test]
    fn rate_over_fixed_elapsed() {
        let mut rate = TransferRate::start();
        rate.add(1000);
        rate.add(1000);
        assert_eq!(rate.bytes(), 2000);
        assert_eq!(rate.bytes_per_second_over(Duration::from_secs(2)), 1000.0);
        assert_eq!(rate.bytes_per_second_over(Duration::ZERO), 0.0);
    }

    #[test]
    fn rate_since_start_is_positive() {
        let start = Instant::now() - Duration::from_secs(1);
        let mut rate = TransferRate::starting_at(start);
        rate.add(500);
        let speed = rate.bytes_per_second();
        assert!(speed > 0.0 && speed <= 500.0);
    }

    #[test]
    fn eta_handles_zero_speed() {
        assert_eq!(TransferRate::eta_seconds(1000, 0.0), 0.0);
        assert_eq!(TransferRate::eta_seconds(1000, 250.0), 4.0);
        assert_eq!(TransferRate::eta_seconds(0, 250.0), 0.0);
    }
}
