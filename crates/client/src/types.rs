use std::path::{Path, PathBuf};

use chunkup_protocol::{FileCategory, UploadMetadata};

/// A file to upload plus what to tell the store about it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// Name sent to the store; defaults to the path's file name.
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub metadata: UploadMetadata,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            filename: None,
            mime_type: None,
            metadata: UploadMetadata::default(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the MIME type and derives the category from it.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        self.metadata.category = FileCategory::detect(&mime_type);
        self.mime_type = Some(mime_type);
        self
    }

    pub fn with_metadata(mut self, metadata: UploadMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Name shown to observers and sent on initiate.
    pub fn display_name(&self) -> String {
        self.filename
            .clone()
            .or_else(|| file_name(&self.path))
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
