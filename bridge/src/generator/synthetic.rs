use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use trashcore::detection::{
    DetectionRecord, DetectionResponse, DetectionService, DetectionServiceError, GeoPoint,
    ImagePayload, MemoryMetadataStore, MetadataDocument,
};

/// Default map centre.
pub const MAP_CENTER: GeoPoint = GeoPoint {
    lat: 1.492659,
    lng: 103.7413591,
};

/// Configuration for generating synthetic sightings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub center: GeoPoint,
    /// Half-width of the scatter box, in degrees.
    pub spread_deg: f64,
    pub max_trash: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            center: MAP_CENTER,
            spread_deg: 0.05,
            max_trash: 9,
        }
    }
}

struct Sample {
    location: GeoPoint,
    date: String,
    trash_count: u32,
}

fn draw(rng: &mut StdRng, config: &SyntheticConfig) -> Sample {
    let spread = config.spread_deg.abs().max(f64::EPSILON);
    Sample {
        location: GeoPoint::new(
            config.center.lat + rng.gen_range(-spread..spread),
            config.center.lng + rng.gen_range(-spread..spread),
        ),
        date: format!("2024-10-{:02}", rng.gen_range(13..=16)),
        trash_count: rng.gen_range(0..=config.max_trash),
    }
}

pub fn synthetic_sightings(count: usize, config: &SyntheticConfig) -> Vec<DetectionRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..count)
        .map(|idx| {
            let sample = draw(&mut rng, config);
            DetectionRecord::new(
                format!("synthetic-{:04}", idx + 1),
                sample.location,
                Some(sample.date),
                sample.trash_count,
                None,
            )
        })
        .collect()
}

/// Offline stand-in for the detection backend.
///
/// Like the real backend it writes the metadata document before replying,
/// so the pipeline's lookup finds it.
pub struct SyntheticDetectionService {
    rng: Mutex<StdRng>,
    config: SyntheticConfig,
    metadata: Arc<MemoryMetadataStore>,
    issued: AtomicU64,
}

impl SyntheticDetectionService {
    pub fn new(config: SyntheticConfig, metadata: Arc<MemoryMetadataStore>) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            metadata,
            issued: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl DetectionService for SyntheticDetectionService {
    async fn submit(
        &self,
        image: ImagePayload,
    ) -> Result<DetectionResponse, DetectionServiceError> {
        let sample = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| DetectionServiceError::Transport("generator poisoned".into()))?;
            draw(&mut rng, &self.config)
        };
        let issued = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let document_id = format!("offline-{:04}", issued);
        self.metadata.insert(
            document_id.clone(),
            MetadataDocument::new(sample.date, sample.location.lat, sample.location.lng),
        );
        let image_url = format!("memory://uploads/{}", image.file_name.replace(' ', "%20"));
        Ok(DetectionResponse {
            bounding_box_image_url: Some(format!("{image_url}?boxes=1")),
            image_url,
            trash_count: sample.trash_count,
            document_id,
        })
    }
}
