use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` for states with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, UploadStatus::Uploading)
    }
}

/// Category attached to an uploaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    #[default]
    Document,
    Image,
    Video,
    Plan,
    Render,
    Contract,
}

impl FileCategory {
    /// Picks a category from a MIME type: images and videos get their own
    /// category, everything else is a document.
    pub fn detect(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            FileCategory::Image
        } else if mime.starts_with("video/") {
            FileCategory::Video
        } else {
            FileCategory::Document
        }
    }
}

/// Caller-supplied metadata forwarded verbatim to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub category: FileCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Point-in-time view of one upload, as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub upload_id: String,
    pub filename: String,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    pub status: UploadStatus,
    pub speed_bytes_per_sec: f64,
    pub eta_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressSnapshot {
    /// Snapshot of an upload that has not transferred anything yet.
    pub fn initial(upload_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            filename: filename.into(),
            progress: 0.0,
            status: UploadStatus::Uploading,
            speed_bytes_per_sec: 0.0,
            eta_seconds: 0.0,
            error: None,
        }
    }
}
