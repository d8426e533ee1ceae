use serde::{Deserialize, Serialize};
use trashcore::pipeline::UploadReport;
use trashcore::state::Projections;
use trashcore::telemetry::MetricsSnapshot;
use trashcore::view::{SurfaceStyle, ViewState};

/// Everything the map surface needs for one render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationModel {
    pub view: ViewState,
    pub style: SurfaceStyle,
    /// Style generation the renderer should acknowledge via `/surface/ack`.
    pub pending_clear: Option<u64>,
    pub projections: Projections,
    pub record_count: usize,
    pub last_upload: Option<UploadReport>,
    pub metrics: MetricsSnapshot,
}
