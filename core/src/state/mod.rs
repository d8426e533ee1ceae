pub mod projection;
pub mod reconciler;
pub mod store;

pub use projection::{
    heatmap_projection, marker_projection, DisplayPayload, HeatmapPoint, MarkerPoint, Projections,
};
pub use reconciler::{MapSnapshot, Reconciler};
pub use store::{RecordStore, UpsertOutcome};
