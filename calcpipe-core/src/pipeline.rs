//! Pipeline composition convention shared by every calculator.
//!
//! Per identifier: read via the source, compute, persist via
//! `saver.save_with_backup`, and record exactly one `CalculationResult`.
//! A failing identifier is recorded with its failure stage and the batch
//! moves on to the next one.

use polars::prelude::{DataFrame, PolarsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::components::{
    CalculationError, CalculationResult, DataBackup, DataSaver, DataSource, FailureStage,
    SaveWithBackup, UnitStatus,
};

/// Why a calculation step could not produce a result frame.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("no data found")]
    EmptyInput,

    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// Counts over a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub failed_identifiers: Vec<String>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub fn summarize(results: &[CalculationResult]) -> RunSummary {
    let failed_identifiers: Vec<String> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.identifier.clone())
        .collect();

    RunSummary {
        total: results.len(),
        completed: results.len() - failed_identifiers.len(),
        failed: failed_identifiers.len(),
        failed_identifiers,
    }
}

/// The identifiers a run should process: the caller's restriction, or
/// everything the source lists.
pub fn resolve_identifiers(
    source: &dyn DataSource,
    identifiers: Option<&[String]>,
) -> Result<Vec<String>, CalculationError> {
    match identifiers {
        Some(ids) => Ok(ids.to_vec()),
        None => source.list_sources().map_err(CalculationError::ListSources),
    }
}

/// Run one unit of work: read `identifier`, compute, save under `destination`
/// with backup.
pub fn process_unit<F>(
    source: &dyn DataSource,
    saver: &dyn DataSaver,
    backup: &dyn DataBackup,
    identifier: &str,
    destination: &str,
    compute: F,
) -> CalculationResult
where
    F: FnOnce(DataFrame) -> Result<DataFrame, ComputeError>,
{
    let failed = |stage: FailureStage, reason: String| CalculationResult {
        identifier: identifier.to_string(),
        destination: destination.to_string(),
        status: UnitStatus::Failed { stage, reason },
    };

    let input = match source.get_data(identifier) {
        Ok(df) if df.height() == 0 => {
            error!(identifier, "no data found");
            return failed(FailureStage::Read, ComputeError::EmptyInput.to_string());
        }
        Ok(df) => df,
        Err(e) => {
            error!(identifier, error = %e, "read failed");
            return failed(FailureStage::Read, e.to_string());
        }
    };

    let output = match compute(input) {
        Ok(df) => df,
        Err(e) => {
            error!(identifier, error = %e, "calculation failed");
            return failed(FailureStage::Compute, e.to_string());
        }
    };

    let rows = output.height();
    match saver.save_with_backup(&output, destination, backup) {
        SaveWithBackup::BackedUp { location } => CalculationResult {
            identifier: identifier.to_string(),
            destination: destination.to_string(),
            status: UnitStatus::Completed {
                rows,
                backup: location,
            },
        },
        SaveWithBackup::SaveFailed { reason } => failed(FailureStage::Save, reason),
        SaveWithBackup::BackupFailed { reason } => failed(FailureStage::Backup, reason),
    }
}

/// Apply `compute` to every identifier, continuing past failures.
///
/// `destination` maps a source identifier to the identifier results are
/// saved under.
pub fn run_units<D, F>(
    calculator: &str,
    source: &dyn DataSource,
    saver: &dyn DataSaver,
    backup: &dyn DataBackup,
    identifiers: Option<&[String]>,
    destination: D,
    compute: F,
) -> Result<Vec<CalculationResult>, CalculationError>
where
    D: Fn(&str) -> String,
    F: Fn(DataFrame) -> Result<DataFrame, ComputeError>,
{
    let identifiers = resolve_identifiers(source, identifiers)?;
    info!(
        calculator,
        units = identifiers.len(),
        "starting complete calculation"
    );

    let mut results = Vec::with_capacity(identifiers.len());
    for identifier in &identifiers {
        let target = destination(identifier);
        let result = process_unit(source, saver, backup, identifier, &target, &compute);
        match &result.status {
            UnitStatus::Completed { rows, backup } => {
                info!(calculator, identifier = %identifier, destination = %target, rows, backup = %backup, "unit completed");
            }
            UnitStatus::Failed { stage, reason } => {
                warn!(calculator, identifier = %identifier, ?stage, %reason, "unit failed");
            }
        }
        results.push(result);
    }

    let summary = summarize(&results);
    if summary.all_succeeded() {
        info!(calculator, total = summary.total, "calculation completed successfully");
    } else {
        error!(
            calculator,
            total = summary.total,
            failed = summary.failed,
            "calculation completed with errors"
        );
    }

    Ok(results)
}
