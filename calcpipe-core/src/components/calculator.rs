//! Calculator contract and the per-identifier result shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::backup::{BackupLocation, DataBackup};
use super::health::HealthCheck;
use super::outcome::StoreError;
use super::saver::DataSaver;
use super::source::DataSource;

/// Step of a unit of work that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Read,
    Compute,
    Save,
    Backup,
}

/// What happened to one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Completed { rows: usize, backup: BackupLocation },
    Failed { stage: FailureStage, reason: String },
}

/// One entry per processed identifier, in processing order.
///
/// Failed identifiers are reported here with a `Failed` status, never dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub identifier: String,
    pub destination: String,
    pub status: UnitStatus,
}

impl CalculationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, UnitStatus::Completed { .. })
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        match self.status {
            UnitStatus::Failed { stage, .. } => Some(stage),
            UnitStatus::Completed { .. } => None,
        }
    }
}

/// Faults that abort a whole calculation run.
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("could not enumerate sources: {0}")]
    ListSources(#[source] StoreError),
}

/// Drives one complete processing run over a source.
///
/// Components are passed as capability-typed trait objects so any conforming
/// backend can be substituted. Per-identifier failures are reported in the
/// returned results; only faults that prevent the run from starting are
/// returned as `Err`.
pub trait Calculator: HealthCheck {
    /// Registered type name (e.g., "aaa").
    fn name(&self) -> &str;

    /// Process `identifiers`, or every identifier from `source.list_sources()`
    /// when `None`.
    fn run_complete_calculation(
        &self,
        source: &dyn DataSource,
        saver: &dyn DataSaver,
        backup: &dyn DataBackup,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<CalculationResult>, CalculationError>;
}
