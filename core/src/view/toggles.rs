use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    #[default]
    Roadmap,
    Satellite,
}

impl MapType {
    pub fn flipped(self) -> Self {
        match self {
            MapType::Roadmap => MapType::Satellite,
            MapType::Satellite => MapType::Roadmap,
        }
    }
}

/// Presentation flags gating the projections and the surface style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub show_markers: bool,
    pub show_heatmap: bool,
    pub map_type: MapType,
    pub show_labels: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            show_markers: true,
            show_heatmap: false,
            map_type: MapType::Roadmap,
            show_labels: true,
        }
    }
}

impl ViewState {
    /// Flips exactly one flag.
    pub fn toggled(self, flag: ViewFlag) -> Self {
        let mut next = self;
        match flag {
            ViewFlag::Markers => next.show_markers = !next.show_markers,
            ViewFlag::Heatmap => next.show_heatmap = !next.show_heatmap,
            ViewFlag::MapType => next.map_type = next.map_type.flipped(),
            ViewFlag::Labels => next.show_labels = !next.show_labels,
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewFlag {
    Markers,
    Heatmap,
    MapType,
    Labels,
}

impl ViewFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewFlag::Markers => "markers",
            ViewFlag::Heatmap => "heatmap",
            ViewFlag::MapType => "map-type",
            ViewFlag::Labels => "labels",
        }
    }

    /// Whether flipping this flag changes the projections.
    pub fn affects_projections(self) -> bool {
        matches!(self, ViewFlag::Markers | ViewFlag::Heatmap)
    }
}

impl fmt::Display for ViewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown view flag: {0}")]
pub struct UnknownViewFlag(pub String);

impl FromStr for ViewFlag {
    type Err = UnknownViewFlag;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "markers" => Ok(ViewFlag::Markers),
            "heatmap" => Ok(ViewFlag::Heatmap),
            "map-type" => Ok(ViewFlag::MapType),
            "labels" => Ok(ViewFlag::Labels),
            other => Err(UnknownViewFlag(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_do_not_couple_flags() {
        let base = ViewState::default();
        let next = base.toggled(ViewFlag::Heatmap);
        assert!(next.show_heatmap);
        assert_eq!(next.show_markers, base.show_markers);
        assert_eq!(next.map_type, base.map_type);
        assert_eq!(next.show_labels, base.show_labels);
        assert_eq!(next.toggled(ViewFlag::Heatmap), base);
    }

    #[test]
    fn map_type_flips_between_variants() {
        let state = ViewState::default().toggled(ViewFlag::MapType);
        assert_eq!(state.map_type, MapType::Satellite);
    }

    #[test]
    fn flags_parse_from_route_segments() {
        for flag in [ViewFlag::Markers, ViewFlag::Heatmap, ViewFlag::MapType, ViewFlag::Labels] {
            assert_eq!(flag.as_str().parse::<ViewFlag>().unwrap(), flag);
        }
        assert!("traffic".parse::<ViewFlag>().is_err());
    }
}
