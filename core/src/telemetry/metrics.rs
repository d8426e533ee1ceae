use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::prelude::PipelineError;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Upload pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads_started: usize,
    pub committed: usize,
    pub upload_failures: usize,
    pub metadata_missing: usize,
    pub discarded: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_started(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.uploads_started += 1;
        }
    }

    pub fn record_committed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.committed += 1;
        }
    }

    pub fn record_error(&self, error: &PipelineError) {
        if let Ok(mut metrics) = self.inner.lock() {
            match error {
                PipelineError::StaleResponseDiscarded { .. } => metrics.discarded += 1,
                PipelineError::MetadataNotFound { .. } => metrics.metadata_missing += 1,
                _ => metrics.upload_failures += 1,
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_bucketed_by_kind() {
        let metrics = MetricsRecorder::new();
        metrics.record_started();
        metrics.record_error(&PipelineError::EmptyImage);
        metrics.record_error(&PipelineError::MetadataNotFound { id: "a".into() });
        metrics.record_error(&PipelineError::StaleResponseDiscarded { ticket: 1 });
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_started, 1);
        assert_eq!(snapshot.upload_failures, 1);
        assert_eq!(snapshot.metadata_missing, 1);
        assert_eq!(snapshot.discarded, 1);
    }
}
