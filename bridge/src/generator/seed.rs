use anyhow::Context;
use std::fs;
use std::path::Path;
use trashcore::detection::{DetectionRecord, GeoPoint};

/// Sightings shipped with the map before any upload (Johor Strait survey).
pub fn demo_sightings() -> Vec<DetectionRecord> {
    const SIGHTINGS: [(f64, f64, &str, &str, u32); 12] = [
        (
            1.4505,
            103.5658,
            "2024-10-14",
            "https://3.bp.blogspot.com/-61RRlAbe-oI/WY9cjWUcqWI/AAAAAAAAAhs/1wFrbz13fDAaZYWHqQ6b5s2moW6OE_9zACLcBGAs/s1600/IMG_4980.jpg",
            5,
        ),
        (1.43, 103.5858, "2024-10-13", "", 2),
        (1.4605, 103.5598, "2024-10-15", "", 3),
        (1.4450, 103.5708, "2024-10-14", "", 1),
        (1.4555, 103.5758, "2024-10-16", "", 9),
        (1.4375, 103.5808, "2024-10-13", "", 2),
        (1.4425, 103.5558, "2024-10-15", "", 3),
        (1.4655, 103.5908, "2024-10-14", "", 1),
        (1.4250, 103.5658, "2024-10-16", "", 2),
        (
            1.4705,
            103.5758,
            "2024-10-13",
            "https://firebasestorage.googleapis.com/v0/b/airecondrone.appspot.com/o/DJI_1005.JPG?alt=media",
            5,
        ),
        (1.4325, 103.5958, "2024-10-15", "", 9),
        (1.4575, 103.5508, "2024-10-14", "", 1),
    ];

    SIGHTINGS
        .iter()
        .enumerate()
        .map(|(idx, &(lat, lng, date, picture, count))| {
            DetectionRecord::new(
                format!("demo-{:02}", idx + 1),
                GeoPoint::new(lat, lng),
                Some(date.to_string()),
                count,
                Some(picture.to_string()),
            )
        })
        .collect()
}

/// Loads pre-existing records from a YAML list.
pub fn load_seed_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<DetectionRecord>> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading seed file {}", path_ref.display()))?;
    let records: Vec<DetectionRecord> = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing seed file {}", path_ref.display()))?;
    // Blank/unknown fields go through the same normalization as pipeline commits.
    Ok(records
        .into_iter()
        .map(|r| {
            DetectionRecord::new(r.id, r.location, r.date_created, r.trash_count, r.image_url)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn demo_set_has_unique_ids_and_optional_pictures() {
        let records = demo_sightings();
        assert_eq!(records.len(), 12);
        assert_eq!(records.iter().filter(|r| r.image_url.is_some()).count(), 2);
        let ids: HashSet<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn seed_file_normalizes_fields() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"- id: s1\n  location: { lat: 1.44, lng: 103.6 }\n  date_created: Unknown\n  trash_count: 4\n  image_url: \"\"\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let records = load_seed_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date_created, None);
        assert_eq!(records[0].image_url, None);
        assert_eq!(records[0].trash_count, 4);
    }
}
