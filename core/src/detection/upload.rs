use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detection::record::non_empty;

/// Raw image bytes handed to the detection endpoint.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Structured reply from the detection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub image_url: String,
    #[serde(default)]
    pub bounding_box_image_url: Option<String>,
    pub trash_count: u32,
    /// Correlation identifier of the metadata document written for this upload.
    pub document_id: String,
}

impl DetectionResponse {
    /// Annotated image when available, the raw upload otherwise.
    pub fn display_image(&self) -> Option<String> {
        non_empty(self.bounding_box_image_url.clone())
            .or_else(|| non_empty(Some(self.image_url.clone())))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionServiceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("detection endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed detection response: {0}")]
    Decode(String),
}

/// Port for the external detection endpoint.
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn submit(&self, image: ImagePayload) -> Result<DetectionResponse, DetectionServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decodes_backend_json() {
        let body = r#"{"image_url":"https://img/a.jpg","bounding_box_image_url":"https://img/a_bb.jpg","trash_count":5,"document_id":"abc"}"#;
        let response: DetectionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.trash_count, 5);
        assert_eq!(response.document_id, "abc");
        assert_eq!(response.display_image().as_deref(), Some("https://img/a_bb.jpg"));
    }

    #[test]
    fn display_image_falls_back_to_raw_upload() {
        let response = DetectionResponse {
            image_url: "https://img/raw.jpg".into(),
            bounding_box_image_url: Some(String::new()),
            trash_count: 1,
            document_id: "d".into(),
        };
        assert_eq!(response.display_image().as_deref(), Some("https://img/raw.jpg"));
    }
}
