pub mod detection;
pub mod metadata;

pub use detection::HttpDetectionService;
pub use metadata::HttpMetadataStore;
