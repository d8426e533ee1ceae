use crate::clients::{HttpDetectionService, HttpMetadataStore};
use crate::generator::synthetic::{SyntheticConfig, SyntheticDetectionService};
use crate::gui_bridge::model::VisualizationModel;
use crate::gui_bridge::surface::PublishedSurface;
use crate::workflow::config::BridgeConfig;
use anyhow::Context;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use trashcore::detection::{
    DetectionRecord, DetectionService, ImagePayload, MemoryMetadataStore, MetadataResolver,
    MetadataStore,
};
use trashcore::pipeline::{UploadPipeline, UploadReport};
use trashcore::state::Reconciler;
use trashcore::view::{LabelStyle, StyleSurfaceError, ViewController, ViewFlag, ViewState};

/// Wires the pipeline, reconciler and view controller for one bridge process.
#[derive(Clone)]
pub struct Runner {
    pipeline: Arc<UploadPipeline>,
    view: Arc<ViewController>,
    surface: Arc<PublishedSurface>,
    last_upload: Arc<RwLock<Option<UploadReport>>>,
}

impl Runner {
    pub fn new(
        config: &BridgeConfig,
        detection: Arc<dyn DetectionService>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(config.view));
        let surface = Arc::new(PublishedSurface::new(
            LabelStyle::for_labels(config.view.show_labels),
            config.settle_delay(),
        ));
        let view = Arc::new(ViewController::new(reconciler.clone(), surface.clone()));
        let resolver = MetadataResolver::with_policy(metadata, config.retry);
        let pipeline = Arc::new(UploadPipeline::new(detection, resolver, reconciler));
        Self {
            pipeline,
            view,
            surface,
            last_upload: Arc::new(RwLock::new(None)),
        }
    }

    /// Talks to the real detection backend and metadata service over HTTP.
    pub fn connect(config: &BridgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("building HTTP client")?;
        let detection = Arc::new(HttpDetectionService::new(
            client.clone(),
            config.detection_url.clone(),
        ));
        let metadata = Arc::new(HttpMetadataStore::new(
            client,
            config.metadata_url.clone(),
            config.collection.clone(),
        ));
        Ok(Self::new(config, detection, metadata))
    }

    /// Runs against the synthetic detection backend and an in-memory store.
    pub fn offline(config: &BridgeConfig, synthetic: SyntheticConfig) -> Self {
        let store = Arc::new(MemoryMetadataStore::new());
        let detection = Arc::new(SyntheticDetectionService::new(synthetic, store.clone()));
        Self::new(config, detection, store)
    }

    pub fn seed(&self, records: Vec<DetectionRecord>) -> usize {
        self.pipeline.reconciler().seed(records)
    }

    pub async fn execute(&self, image: ImagePayload) -> UploadReport {
        let report = self.pipeline.submit(image).await;
        if !report.is_discarded() {
            self.remember(&report);
        }
        report
    }

    /// Keeps the report of the most recently started upload; a slower,
    /// older upload finishing later does not replace it.
    fn remember(&self, report: &UploadReport) {
        let mut last = self
            .last_upload
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_ref().map_or(true, |prev| prev.ticket <= report.ticket) {
            *last = Some(report.clone());
        }
    }

    pub async fn upload_file(&self, path: &Path) -> anyhow::Result<UploadReport> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading image {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        Ok(self.execute(ImagePayload::new(file_name, bytes)).await)
    }

    pub fn cancel_uploads(&self) -> usize {
        self.pipeline.cancel_all()
    }

    pub async fn toggle(&self, flag: ViewFlag) -> Result<ViewState, StyleSurfaceError> {
        self.view.toggle(flag).await
    }

    pub async fn surface_loaded(&self) -> Result<(), StyleSurfaceError> {
        self.view.surface_loaded().await.map(|_| ())
    }

    pub fn acknowledge_clear(&self, generation: u64) -> bool {
        self.surface.acknowledge(generation)
    }

    pub async fn surface_unloaded(&self) {
        self.view.surface_unloaded().await;
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.pipeline.reconciler().records()
    }

    pub fn model(&self) -> VisualizationModel {
        let snapshot = self.pipeline.reconciler().snapshot();
        VisualizationModel {
            view: snapshot.view,
            style: self.surface.current(),
            pending_clear: self.surface.pending_clear(),
            projections: snapshot.projections,
            record_count: snapshot.record_count,
            last_upload: self
                .last_upload
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            metrics: self.pipeline.metrics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::seed::demo_sightings;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use trashcore::pipeline::{UploadSession, UploadStatus};
    use trashcore::view::SurfaceStyle;

    fn offline_runner() -> Runner {
        let config = BridgeConfig {
            settle_ms: 0,
            ..BridgeConfig::default()
        };
        Runner::offline(&config, SyntheticConfig::default())
    }

    #[test]
    fn seeded_demo_data_appears_in_model() {
        let runner = offline_runner();
        assert_eq!(runner.seed(demo_sightings()), 12);
        let model = runner.model();
        assert_eq!(model.record_count, 12);
        assert_eq!(model.projections.markers.len(), 12);
        assert!(model.projections.heatmap.is_empty());
        assert_eq!(model.style, SurfaceStyle::Styled(LabelStyle::Labeled));
    }

    #[tokio::test]
    async fn upload_file_runs_offline_pipeline() {
        let runner = offline_runner();
        let mut image = NamedTempFile::new().unwrap();
        image.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let report = runner.upload_file(image.path()).await.unwrap();

        assert!(report.is_committed());
        let model = runner.model();
        assert_eq!(model.record_count, 1);
        assert_eq!(model.metrics.committed, 1);
        assert_eq!(model.last_upload, Some(report));
    }

    #[tokio::test]
    async fn empty_file_is_reported_to_the_user() {
        let runner = offline_runner();
        let image = NamedTempFile::new().unwrap();

        let report = runner.upload_file(image.path()).await.unwrap();

        assert_eq!(
            report.session.error.as_deref(),
            Some("Please select a file first.")
        );
        assert_eq!(runner.model().record_count, 0);
    }

    #[test]
    fn older_upload_does_not_replace_newer_report() {
        let runner = offline_runner();
        let report = |ticket: u64, file: &str| UploadReport {
            ticket,
            session: UploadSession::new(file),
            status: UploadStatus::Failed {
                message: "Prediction failed. Please try again.".into(),
            },
        };

        runner.remember(&report(2, "newer.jpg"));
        runner.remember(&report(1, "older.jpg"));

        let last = runner.model().last_upload.unwrap();
        assert_eq!(last.ticket, 2);
        assert_eq!(last.session.file_name, "newer.jpg");
    }
}
