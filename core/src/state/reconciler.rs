use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::detection::record::DetectionRecord;
use crate::state::projection::Projections;
use crate::state::store::{RecordStore, UpsertOutcome};
use crate::telemetry::log::LogManager;
use crate::view::toggles::{ViewFlag, ViewState};

/// Consistent read of the view flags and the projections they produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub view: ViewState,
    pub projections: Projections,
    pub record_count: usize,
}

struct ReconcilerState {
    store: RecordStore,
    view: ViewState,
    revision: u64,
}

impl ReconcilerState {
    fn derive(&mut self) -> Arc<Projections> {
        self.revision += 1;
        Arc::new(Projections::derive(
            self.revision,
            self.store.records(),
            self.view.show_markers,
            self.view.show_heatmap,
        ))
    }
}

/// Owns the record store and view flags; republishes both projections
/// together whenever either input changes.
pub struct Reconciler {
    state: RwLock<ReconcilerState>,
    published: watch::Sender<Arc<Projections>>,
    logger: LogManager,
}

impl Reconciler {
    pub fn new(view: ViewState) -> Self {
        let mut state = ReconcilerState {
            store: RecordStore::new(),
            view,
            revision: 0,
        };
        let initial = state.derive();
        let (published, _) = watch::channel(initial);
        Self {
            state: RwLock::new(state),
            published,
            logger: LogManager::new("reconciler"),
        }
    }

    pub fn upsert(&self, record: DetectionRecord) -> UpsertOutcome {
        let mut state = self.write();
        self.commit(&mut state, record)
    }

    /// Commits `record` only if `admit` still holds once the write lock is held.
    pub fn upsert_if<F>(&self, record: DetectionRecord, admit: F) -> Option<UpsertOutcome>
    where
        F: FnOnce() -> bool,
    {
        let mut state = self.write();
        if !admit() {
            return None;
        }
        Some(self.commit(&mut state, record))
    }

    /// Bulk-loads pre-existing records with a single republish.
    pub fn seed<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = DetectionRecord>,
    {
        let mut state = self.write();
        let mut loaded = 0;
        for record in records {
            state.store.upsert(record);
            loaded += 1;
        }
        let projections = state.derive();
        self.logger.record(&format!(
            "seeded {} records ({} stored)",
            loaded,
            state.store.len()
        ));
        self.published.send_replace(projections);
        loaded
    }

    pub fn toggle(&self, flag: ViewFlag) -> ViewState {
        let mut state = self.write();
        state.view = state.view.toggled(flag);
        if flag.affects_projections() {
            let projections = state.derive();
            self.published.send_replace(projections);
        }
        self.logger.debug(&format!("toggled {} -> {:?}", flag, state.view));
        state.view
    }

    pub fn view(&self) -> ViewState {
        self.read().view
    }

    pub fn projections(&self) -> Arc<Projections> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Projections>> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> MapSnapshot {
        let state = self.read();
        MapSnapshot {
            view: state.view,
            projections: self.published.borrow().as_ref().clone(),
            record_count: state.store.len(),
        }
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.read().store.records().to_vec()
    }

    pub fn get(&self, id: &str) -> Option<DetectionRecord> {
        self.read().store.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().store.is_empty()
    }

    fn commit(&self, state: &mut ReconcilerState, record: DetectionRecord) -> UpsertOutcome {
        let id = record.id.clone();
        let outcome = state.store.upsert(record);
        let projections = state.derive();
        self.logger.record(&format!(
            "{:?} {} -> revision {} ({} markers, {} heat points)",
            outcome,
            id,
            projections.revision,
            projections.markers.len(),
            projections.heatmap.len()
        ));
        self.published.send_replace(projections);
        outcome
    }

    fn read(&self) -> RwLockReadGuard<'_, ReconcilerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ReconcilerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}
