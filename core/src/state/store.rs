use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::detection::record::DetectionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Canonical record list, keyed by correlation id.
///
/// Records keep the position of their first insertion; replacing a record
/// never moves it.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: Vec<DetectionRecord>,
    index: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: DetectionRecord) -> UpsertOutcome {
        match self.index.get(&record.id) {
            Some(&slot) => {
                self.records[slot] = record;
                UpsertOutcome::Replaced
            }
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                UpsertOutcome::Inserted
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&DetectionRecord> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::record::GeoPoint;

    fn record(id: &str, count: u32) -> DetectionRecord {
        DetectionRecord::new(id, GeoPoint::new(1.0, 2.0), None, count, None)
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut store = RecordStore::new();
        assert_eq!(store.upsert(record("a", 1)), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(record("b", 2)), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(record("a", 7)), UpsertOutcome::Replaced);

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].id, "a");
        assert_eq!(store.records()[0].trash_count, 7);
        assert_eq!(store.get("b").map(|r| r.trash_count), Some(2));
    }
}
