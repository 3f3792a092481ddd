//! Backup service contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::health::HealthCheck;
use super::outcome::StoreError;

/// Where a backup copy ended up (a path, an object key, a table name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupLocation(pub String);

impl BackupLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single backup request.
///
/// `Skipped` is the explicit "no backup was performed" branch; there is no
/// location to report in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Created { location: BackupLocation },
    Skipped { reason: String },
}

impl BackupOutcome {
    pub fn created(location: impl Into<String>) -> Self {
        BackupOutcome::Created {
            location: BackupLocation::new(location),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        BackupOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, BackupOutcome::Created { .. })
    }

    pub fn location(&self) -> Option<&BackupLocation> {
        match self {
            BackupOutcome::Created { location } => Some(location),
            BackupOutcome::Skipped { .. } => None,
        }
    }
}

/// Snapshots or duplicates data a saver has already persisted.
pub trait DataBackup: HealthCheck {
    /// Registered type name (e.g., "file_copy").
    fn name(&self) -> &str;

    /// Back up the persisted data behind `identifier`.
    fn backup_data(&self, identifier: &str) -> Result<BackupOutcome, StoreError>;

    /// Back up every known destination, returning `(identifier, location)`
    /// for each copy made.
    fn backup_all(&self) -> Result<Vec<(String, BackupLocation)>, StoreError>;
}
