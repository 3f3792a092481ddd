//! Timestamped file copies of persisted datasets.
//!
//! Layout: `{backup_root}/{stem}/{timestamp}.{ext}`. Snapshots beyond
//! `keep_last` are pruned oldest-first after every copy.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{file_name_for, stem_of, validate_identifier};
use crate::components::{
    ArgsError, BackupLocation, BackupOutcome, ComponentArgs, DataBackup, HealthCheck, StoreError,
};

const DEFAULT_KEEP_LAST: usize = 5;

#[derive(Debug, Clone)]
pub struct FileBackup {
    data_root: PathBuf,
    backup_root: PathBuf,
    extension: String,
    keep_last: usize,
}

impl FileBackup {
    pub fn new(
        data_root: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            backup_root: backup_root.into(),
            extension: extension.into(),
            keep_last: DEFAULT_KEEP_LAST,
        }
    }

    /// `data_root` and `backup_root` are required; `extension` defaults to
    /// `csv`; `keep_last` defaults to 5 (0 keeps everything).
    pub fn from_args(args: &ComponentArgs) -> Result<Self, ArgsError> {
        let data_root = args.path_param("data_root")?;
        let backup_root = args.path_param("backup_root")?;
        let extension = args.str_param("extension")?.unwrap_or("csv").to_string();
        let keep_last = args.usize_param("keep_last", DEFAULT_KEEP_LAST)?;
        Ok(Self::new(data_root, backup_root, extension).with_keep_last(keep_last))
    }

    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    fn snapshot_dir(&self, identifier: &str) -> PathBuf {
        self.backup_root.join(stem_of(identifier, &self.extension))
    }

    /// Existing snapshots of `identifier`, oldest first.
    pub fn snapshots(&self, identifier: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.snapshot_dir(identifier)) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()))
            .collect();
        // Timestamped names sort chronologically.
        paths.sort();
        paths
    }

    fn next_snapshot_path(&self, dir: &Path) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut candidate = dir.join(format!("{stamp}.{}", self.extension));
        let mut n = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{stamp}_{n}.{}", self.extension));
            n += 1;
        }
        candidate
    }

    fn prune(&self, identifier: &str) {
        if self.keep_last == 0 {
            return;
        }
        let snapshots = self.snapshots(identifier);
        let excess = snapshots.len().saturating_sub(self.keep_last);
        for old in snapshots.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&old) {
                warn!(path = %old.display(), error = %e, "failed to prune snapshot");
            }
        }
    }
}

impl HealthCheck for FileBackup {
    fn health_check(&self) -> bool {
        self.data_root.is_dir()
            && (self.backup_root.is_dir()
                || (!self.backup_root.exists()
                    && self.backup_root.parent().map_or(false, |p| {
                        p.as_os_str().is_empty() || p.is_dir()
                    })))
    }
}

impl DataBackup for FileBackup {
    fn name(&self) -> &str {
        "file_copy"
    }

    fn backup_data(&self, identifier: &str) -> Result<BackupOutcome, StoreError> {
        validate_identifier(identifier).map_err(|reason| StoreError::write(identifier, reason))?;

        let source = self
            .data_root
            .join(file_name_for(identifier, &self.extension));
        if !source.is_file() {
            return Ok(BackupOutcome::skipped(format!(
                "no persisted file at {}",
                source.display()
            )));
        }

        let dir = self.snapshot_dir(identifier);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::write(identifier, format!("failed to create dir: {e}")))?;

        let target = self.next_snapshot_path(&dir);
        fs::copy(&source, &target)
            .map_err(|e| StoreError::write(identifier, format!("copy failed: {e}")))?;
        debug!(identifier, target = %target.display(), "snapshot written");

        self.prune(identifier);
        Ok(BackupOutcome::created(target.display().to_string()))
    }

    fn backup_all(&self) -> Result<Vec<(String, BackupLocation)>, StoreError> {
        let root = self.data_root.display().to_string();
        let entries = fs::read_dir(&self.data_root).map_err(|e| StoreError::read(&root, e))?;

        let mut identifiers: Vec<String> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            })
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        identifiers.sort();

        let mut created = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            match self.backup_data(&identifier) {
                Ok(BackupOutcome::Created { location }) => created.push((identifier, location)),
                Ok(BackupOutcome::Skipped { .. }) => {}
                Err(e) => warn!(identifier = %identifier, error = %e, "skipping backup"),
            }
        }
        Ok(created)
    }
}
