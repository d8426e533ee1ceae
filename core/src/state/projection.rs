use serde::{Deserialize, Serialize};

use crate::detection::record::{DetectionRecord, GeoPoint};

/// Info-window content for one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub date: Option<String>,
    pub trash_count: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPoint {
    pub id: String,
    pub location: GeoPoint,
    pub payload: DisplayPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub location: GeoPoint,
    pub weight: u32,
}

/// Both projections derived from a single store read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projections {
    pub revision: u64,
    pub markers: Vec<MarkerPoint>,
    pub heatmap: Vec<HeatmapPoint>,
}

impl Projections {
    pub fn derive(
        revision: u64,
        records: &[DetectionRecord],
        show_markers: bool,
        show_heatmap: bool,
    ) -> Self {
        Self {
            revision,
            markers: marker_projection(records, show_markers),
            heatmap: heatmap_projection(records, show_heatmap),
        }
    }

    pub fn max_weight(&self) -> u32 {
        self.heatmap.iter().map(|point| point.weight).max().unwrap_or(0)
    }
}

pub fn marker_projection(records: &[DetectionRecord], show_markers: bool) -> Vec<MarkerPoint> {
    if !show_markers {
        return Vec::new();
    }
    records
        .iter()
        .filter(|record| record.is_visible())
        .map(|record| MarkerPoint {
            id: record.id.clone(),
            location: record.location,
            payload: DisplayPayload {
                date: record.date_created.clone(),
                trash_count: record.trash_count,
                image_url: record.image_url.clone(),
            },
        })
        .collect()
}

/// Heatmap points weighted by trash count.
pub fn heatmap_projection(records: &[DetectionRecord], show_heatmap: bool) -> Vec<HeatmapPoint> {
    if !show_heatmap {
        return Vec::new();
    }
    records
        .iter()
        .filter(|record| record.is_visible())
        .map(|record| HeatmapPoint {
            location: record.location,
            weight: record.trash_count,
        })
        .collect()
}
