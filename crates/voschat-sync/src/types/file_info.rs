//! Metadata for an uploaded file.

use serde::{Deserialize, Serialize};

/// Server-side description of an uploaded file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInfo {
    id: String,
    file_name: String,
    file_size: u64,
    file_type: String,
    file_url: String,
}

impl FileInfo {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        file_type: impl Into<String>,
        file_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            file_size,
            file_type: file_type.into(),
            file_url: file_url.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn file_url(&self) -> &str {
        &self.file_url
    }
}
