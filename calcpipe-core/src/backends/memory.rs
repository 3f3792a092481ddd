//! In-process backend for temporary pipelines and tests.
//!
//! `MemoryStore` is both a source and a saver over one shared map, so data a
//! pipeline saves is immediately readable back. `MemoryBackup` keeps snapshot
//! copies of whatever the paired store holds. Handles are cheap to clone and
//! share the same underlying data.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use polars::prelude::DataFrame;
use tracing::warn;

use crate::components::{
    BackupLocation, BackupOutcome, DataBackup, DataSaver, DataSource, HealthCheck, Outcome,
    StoreError,
};

#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    frames: Arc<RwLock<BTreeMap<String, DataFrame>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Seed a dataset directly, bypassing save validation.
    pub fn insert(&self, identifier: &str, data: DataFrame) {
        self.frames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string(), data);
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn identifiers(&self) -> Vec<String> {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl HealthCheck for MemoryStore {
    fn health_check(&self) -> bool {
        !self.frames.is_poisoned()
    }
}

impl DataSource for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_data(&self, identifier: &str) -> Result<DataFrame, StoreError> {
        let frames = self
            .frames
            .read()
            .map_err(|e| StoreError::read(identifier, e))?;
        frames
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::not_found(identifier))
    }

    fn list_sources(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.identifiers())
    }
}

impl DataSaver for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn save_data(&self, data: &DataFrame, identifier: &str) -> Result<Outcome, StoreError> {
        if data.height() == 0 {
            return Ok(Outcome::failure("refusing to save an empty dataset"));
        }
        let mut frames = self
            .frames
            .write()
            .map_err(|e| StoreError::write(identifier, e))?;
        frames.insert(identifier.to_string(), data.clone());
        Ok(Outcome::Success)
    }
}

/// Snapshot copies of a `MemoryStore`'s contents.
#[derive(Debug, Clone)]
pub struct MemoryBackup {
    store: MemoryStore,
    snapshots: Arc<RwLock<BTreeMap<String, Vec<DataFrame>>>>,
}

impl MemoryBackup {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            snapshots: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of snapshots held for `identifier`.
    pub fn snapshot_count(&self, identifier: &str) -> usize {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .map_or(0, Vec::len)
    }

    /// Most recent snapshot of `identifier`.
    pub fn latest(&self, identifier: &str) -> Option<DataFrame> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .and_then(|versions| versions.last().cloned())
    }
}

impl HealthCheck for MemoryBackup {
    fn health_check(&self) -> bool {
        !self.snapshots.is_poisoned() && self.store.health_check()
    }
}

impl DataBackup for MemoryBackup {
    fn name(&self) -> &str {
        "memory"
    }

    fn backup_data(&self, identifier: &str) -> Result<BackupOutcome, StoreError> {
        let data = match self.store.get_data(identifier) {
            Ok(df) => df,
            Err(StoreError::NotFound { .. }) => {
                return Ok(BackupOutcome::skipped(format!(
                    "nothing persisted under '{identifier}'"
                )))
            }
            Err(e) => return Err(e),
        };

        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| StoreError::write(identifier, e))?;
        let versions = snapshots.entry(identifier.to_string()).or_default();
        versions.push(data);
        Ok(BackupOutcome::created(format!(
            "memory://{identifier}#{}",
            versions.len()
        )))
    }

    fn backup_all(&self) -> Result<Vec<(String, BackupLocation)>, StoreError> {
        let mut created = Vec::new();
        for identifier in self.store.identifiers() {
            match self.backup_data(&identifier) {
                Ok(BackupOutcome::Created { location }) => created.push((identifier, location)),
                Ok(BackupOutcome::Skipped { .. }) => {}
                Err(e) => warn!(identifier = %identifier, error = %e, "skipping backup"),
            }
        }
        Ok(created)
    }
}
