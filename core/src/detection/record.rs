use serde::{Deserialize, Serialize};

/// Written by the detection backend when an image carries no capture date.
const UNKNOWN_DATE: &str = "Unknown";

/// Latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A committed sighting: detection result joined with its metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub date_created: Option<String>,
    pub trash_count: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl DetectionRecord {
    pub fn new(
        id: impl Into<String>,
        location: GeoPoint,
        date_created: Option<String>,
        trash_count: u32,
        image_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            location,
            date_created: normalize_date(date_created),
            trash_count,
            image_url: non_empty(image_url),
        }
    }

    /// Records without detected objects are never projected.
    pub fn is_visible(&self) -> bool {
        self.trash_count > 0
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn normalize_date(value: Option<String>) -> Option<String> {
    non_empty(value).filter(|v| v != UNKNOWN_DATE)
}
