use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trashcore::detection::RetryPolicy;
use trashcore::view::ViewState;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Multipart upload endpoint of the detection backend.
    pub detection_url: String,
    /// Base URL of the metadata document service.
    pub metadata_url: String,
    pub collection: String,
    pub bind: SocketAddr,
    pub request_timeout_ms: u64,
    /// Longest wait for the renderer to acknowledge a style clear.
    pub settle_ms: u64,
    pub max_upload_bytes: u64,
    pub retry: RetryPolicy,
    pub view: ViewState,
    pub seed_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            detection_url: "http://localhost:5050/upload".into(),
            metadata_url: "http://localhost:3000/documents".into(),
            collection: "trash_detection".into(),
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            request_timeout_ms: 30_000,
            settle_ms: 1_500,
            max_upload_bytes: 32 * 1024 * 1024,
            retry: RetryPolicy::default(),
            view: ViewState::default(),
            seed_file: None,
        }
    }
}

impl BridgeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading bridge config {}", path_ref.display()))?;
        let config: BridgeConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing bridge config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_overrides(
        mut self,
        detection_url: Option<String>,
        metadata_url: Option<String>,
        bind: Option<SocketAddr>,
    ) -> Self {
        if let Some(url) = detection_url {
            self.detection_url = url;
        }
        if let Some(url) = metadata_url {
            self.metadata_url = url;
        }
        if let Some(addr) = bind {
            self.bind = addr;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use trashcore::view::MapType;

    #[test]
    fn defaults_point_at_local_backend() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.detection_url, "http://localhost:5050/upload");
        assert_eq!(cfg.retry.attempts, 1);
        assert!(cfg.view.show_markers);
        assert!(!cfg.view.show_heatmap);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"metadata_url: http://firestore.local/docs\nsettle_ms: 250\nretry:\n  attempts: 3\n  delay_ms: 500\nview:\n  show_heatmap: true\n  map_type: satellite\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = BridgeConfig::load(&path).unwrap();
        assert_eq!(cfg.metadata_url, "http://firestore.local/docs");
        assert_eq!(cfg.settle_delay(), Duration::from_millis(250));
        assert_eq!(cfg.retry.attempts, 3);
        assert!(cfg.view.show_heatmap);
        assert!(cfg.view.show_markers);
        assert_eq!(cfg.view.map_type, MapType::Satellite);
        assert_eq!(cfg.collection, "trash_detection");
    }

    #[test]
    fn cli_overrides_win() {
        let cfg = BridgeConfig::default().with_overrides(
            Some("http://det:5050/upload".into()),
            None,
            Some(SocketAddr::from(([0, 0, 0, 0], 9100))),
        );
        assert_eq!(cfg.detection_url, "http://det:5050/upload");
        assert_eq!(cfg.metadata_url, BridgeConfig::default().metadata_url);
        assert_eq!(cfg.bind.port(), 9100);
    }
}
