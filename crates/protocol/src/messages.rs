use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UploadMetadata;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens (or reopens) a chunked upload on the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub filename: String,
    pub total_chunks: u32,
    pub chunk_size: u32,
    pub total_size: u64,
    /// Hex SHA-256 of the whole file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub metadata: UploadMetadata,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Server-side upload handle plus the chunks it already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateResponse {
    pub upload_id: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

/// Acknowledges one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub chunk_number: u32,
    pub received: bool,
    pub upload_progress: f64,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

/// Result of finalizing an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub upload_id: String,
    pub final_file_id: Uuid,
    #[serde(default)]
    pub message: String,
}

/// Server view of a chunked upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedUploadStatus {
    pub upload_id: String,
    pub filename: String,
    pub total_chunks: u32,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
    #[serde(default)]
    pub missing_chunks: Vec<u32>,
    pub progress: f64,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_file_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileCategory;

    #[test]
    fn initiate_request_flattens_metadata() {
        let project = Uuid::nil();
        let req = InitiateRequest {
            filename: "plan.pdf".into(),
            total_chunks: 6,
            chunk_size: 5 * 1024 * 1024,
            total_size: 26 * 1024 * 1024,
            file_checksum: Some("ab".repeat(32)),
            mime_type: Some("application/pdf".into()),
            metadata: UploadMetadata {
                category: FileCategory::Plan,
                project_id: Some(project),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["filename"], "plan.pdf");
        assert_eq!(value["total_chunks"], 6);
        assert_eq!(value["category"], "plan");
        assert_eq!(value["project_id"], project.to_string());
        assert!(value.get("metadata").is_none());
        assert!(value.get("client_id").is_none());

        let parsed: InitiateRequest = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn initiate_response_defaults_uploaded_chunks() {
        let json = r#"{"upload_id":"srv-1","expires_at":"2026-01-01T00:00:00Z"}"#;
        let resp: InitiateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.upload_id, "srv-1");
        assert!(resp.uploaded_chunks.is_empty());
    }

    #[test]
    fn status_parses_server_payload() {
        let json = r#"{
            "upload_id": "srv-1",
            "filename": "a.bin",
            "total_chunks": 3,
            "uploaded_chunks": [1, 3],
            "missing_chunks": [2],
            "progress": 66.6,
            "is_completed": false,
            "created_at": "2026-01-01T00:00:00Z",
            "expires_at": "2026-01-02T00:00:00Z"
        }"#;
        let status: ChunkedUploadStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.missing_chunks, vec![2]);
        assert!(status.final_file_id.is_none());
    }
}
