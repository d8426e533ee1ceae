use serde::{Deserialize, Serialize};

use crate::detection::metadata::MetadataDocument;
use crate::detection::record::non_empty;
use crate::detection::upload::DetectionResponse;
use crate::state::store::UpsertOutcome;

/// Transient display fields owned by a single upload.
///
/// A new session starts empty, so nothing from a previous upload (previews,
/// counts, errors) carries over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    pub file_name: String,
    pub image_url: Option<String>,
    pub bounding_box_image_url: Option<String>,
    pub trash_count: Option<u32>,
    pub metadata: Option<MetadataDocument>,
    pub error: Option<String>,
}

impl UploadSession {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn apply_detection(&mut self, response: &DetectionResponse) {
        self.image_url = non_empty(Some(response.image_url.clone()));
        self.bounding_box_image_url = non_empty(response.bounding_box_image_url.clone());
        self.trash_count = Some(response.trash_count);
    }

    pub fn prediction(&self) -> Option<String> {
        self.trash_count
            .map(|count| format!("Trash Count: {}", count))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    Committed { id: String, outcome: UpsertOutcome },
    Failed { message: String },
    Discarded,
}

/// Result of one upload, with every error already turned into display state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub ticket: u64,
    pub session: UploadSession,
    #[serde(flatten)]
    pub status: UploadStatus,
}

impl UploadReport {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, UploadStatus::Committed { .. })
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self.status, UploadStatus::Discarded)
    }
}
