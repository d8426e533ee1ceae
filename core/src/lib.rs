//! Core state and pipeline logic for the trash-sighting map.
//!
//! The modules cover the upload-correlation pipeline (detection submit,
//! metadata resolution, commit), the detection record store, the derived
//! marker/heatmap projections and the view toggles that gate them.

pub mod detection;
pub mod pipeline;
pub mod prelude;
pub mod state;
pub mod telemetry;
pub mod view;

pub use prelude::{PipelineError, PipelineResult};
