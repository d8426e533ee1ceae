use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::prelude::{PipelineError, PipelineResult};
use crate::telemetry::log::LogManager;

/// Persisted metadata document keyed by the correlation identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl MetadataDocument {
    pub fn new(date_created: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            date_created: Some(date_created.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataStoreError {
    #[error("metadata store unreachable: {0}")]
    Transport(String),
    #[error("metadata store returned status {0}")]
    Status(u16),
    #[error("malformed metadata document: {0}")]
    Decode(String),
}

/// Port for the keyed document store the detection backend writes into.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Point lookup; `Ok(None)` when no document exists for `id`.
    async fn fetch(&self, id: &str) -> Result<Option<MetadataDocument>, MetadataStoreError>;
}

/// Bounded re-check policy for documents that land after the detection reply.
///
/// The default is a single lookup with no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn bounded(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Existence-checked metadata lookup.
pub struct MetadataResolver {
    store: Arc<dyn MetadataStore>,
    policy: RetryPolicy,
    logger: LogManager,
}

impl MetadataResolver {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self::with_policy(store, RetryPolicy::single())
    }

    pub fn with_policy(store: Arc<dyn MetadataStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            logger: LogManager::new("metadata"),
        }
    }

    pub async fn resolve(&self, id: &str) -> PipelineResult<MetadataDocument> {
        let attempts = self.policy.attempts();
        for attempt in 1..=attempts {
            let found = self
                .store
                .fetch(id)
                .await
                .map_err(|source| PipelineError::MetadataLookup {
                    id: id.to_string(),
                    source,
                })?;
            if let Some(document) = found {
                return Ok(document);
            }
            if attempt < attempts {
                self.logger.debug(&format!(
                    "metadata for {} absent (attempt {}/{}), rechecking",
                    id, attempt, attempts
                ));
                tokio::time::sleep(self.policy.delay()).await;
            }
        }
        Err(PipelineError::MetadataNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::memory::MemoryMetadataStore;

    #[tokio::test]
    async fn resolver_returns_present_document() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.insert("abc", MetadataDocument::new("2024-10-14", 1.45, 103.57));
        let resolver = MetadataResolver::new(store);
        let doc = resolver.resolve("abc").await.unwrap();
        assert_eq!(doc.latitude, Some(1.45));
    }

    #[tokio::test]
    async fn resolver_checks_once_by_default() {
        let store = Arc::new(MemoryMetadataStore::new());
        let resolver = MetadataResolver::new(store.clone());
        let err = resolver.resolve("xyz").await.unwrap_err();
        assert!(matches!(err, PipelineError::MetadataNotFound { ref id } if id == "xyz"));
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn bounded_policy_stops_after_configured_attempts() {
        let store = Arc::new(MemoryMetadataStore::new());
        let resolver = MetadataResolver::with_policy(
            store.clone(),
            RetryPolicy::bounded(3, Duration::from_millis(1)),
        );
        assert!(resolver.resolve("late").await.is_err());
        assert_eq!(store.lookups(), 3);
    }

    #[tokio::test]
    async fn store_failures_are_not_reported_as_missing() {
        let store = Arc::new(MemoryMetadataStore::new());
        store.fail_with(MetadataStoreError::Status(503));
        let resolver = MetadataResolver::new(store);
        let err = resolver.resolve("abc").await.unwrap_err();
        assert!(matches!(err, PipelineError::MetadataLookup { .. }));
    }
}
