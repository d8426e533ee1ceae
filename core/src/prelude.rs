use crate::detection::metadata::MetadataStoreError;
use crate::detection::upload::DetectionServiceError;

pub use crate::detection::{DetectionRecord, GeoPoint, ImagePayload};
pub use crate::pipeline::{UploadPipeline, UploadReport, UploadStatus};
pub use crate::state::{MapSnapshot, Projections, Reconciler};
pub use crate::view::{MapType, ViewFlag, ViewState};

/// Failure modes of one upload pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no image selected")]
    EmptyImage,
    #[error("upload failed: {0}")]
    Upload(#[from] DetectionServiceError),
    #[error("no metadata document for {id}")]
    MetadataNotFound { id: String },
    #[error("metadata lookup for {id} failed: {source}")]
    MetadataLookup {
        id: String,
        #[source]
        source: MetadataStoreError,
    },
    #[error("metadata for {id} has no coordinates")]
    MissingLocation { id: String },
    #[error("upload {ticket} superseded or cancelled")]
    StaleResponseDiscarded { ticket: u64 },
}

impl PipelineError {
    /// Text shown to the user, `None` for silently dropped runs.
    pub fn user_message(&self) -> Option<String> {
        match self {
            PipelineError::EmptyImage => Some("Please select a file first.".into()),
            PipelineError::Upload(_) => Some("Prediction failed. Please try again.".into()),
            PipelineError::MetadataNotFound { .. } => {
                Some("No metadata found for the uploaded image.".into())
            }
            PipelineError::MetadataLookup { .. } => {
                Some("Could not read metadata for the uploaded image.".into())
            }
            PipelineError::MissingLocation { .. } => {
                Some("The uploaded image has no GPS location.".into())
            }
            PipelineError::StaleResponseDiscarded { .. } => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_responses_have_no_user_message() {
        assert!(PipelineError::StaleResponseDiscarded { ticket: 3 }
            .user_message()
            .is_none());
        assert_eq!(
            PipelineError::MetadataNotFound { id: "xyz".into() }
                .user_message()
                .as_deref(),
            Some("No metadata found for the uploaded image.")
        );
    }
}
