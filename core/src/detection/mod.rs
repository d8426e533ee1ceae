pub mod memory;
pub mod metadata;
pub mod record;
pub mod upload;

pub use memory::MemoryMetadataStore;
pub use metadata::{
    MetadataDocument, MetadataResolver, MetadataStore, MetadataStoreError, RetryPolicy,
};
pub use record::{DetectionRecord, GeoPoint};
pub use upload::{DetectionResponse, DetectionService, DetectionServiceError, ImagePayload};
