//! Human-readable speed and time figures for progress output.

use chunkup_protocol::{ProgressSnapshot, UploadStatus};

/// Formats a byte rate with one decimal, e.g. `1.5 MB/s`.
pub fn format_speed(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    let mut value = bytes_per_sec.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a duration in whole seconds, minutes or hours.
pub fn format_eta(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        format!("{}s", seconds.round())
    } else if seconds < 3600.0 {
        format!("{}m", (seconds / 60.0).round())
    } else {
        format!("{}h", (seconds / 3600.0).round())
    }
}

/// Progress bar message for a snapshot.
pub fn status_line(snapshot: &ProgressSnapshot) -> String {
    match snapshot.status {
        UploadStatus::Uploading => format!(
            "{} · ETA {}",
            format_speed(snapshot.speed_bytes_per_sec),
            format_eta(snapshot.eta_seconds)
        ),
        UploadStatus::Completed => "done".into(),
        UploadStatus::Cancelled => "cancelled".into(),
        UploadStatus::Error => format!(
            "failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
