use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::detection::metadata::{MetadataDocument, MetadataStore, MetadataStoreError};

/// In-process metadata store used by the offline driver and tests.
#[derive(Default)]
pub struct MemoryMetadataStore {
    documents: Mutex<HashMap<String, MetadataDocument>>,
    failure: Mutex<Option<MetadataStoreError>>,
    lookups: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, document: MetadataDocument) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), document);
    }

    /// Makes every subsequent lookup fail with `error`.
    pub fn fail_with(&self, error: MetadataStoreError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn fetch(&self, id: &str) -> Result<Option<MetadataDocument>, MetadataStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}
