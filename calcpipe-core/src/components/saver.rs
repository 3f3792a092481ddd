//! Data saver contract.

use polars::prelude::DataFrame;

use super::backup::DataBackup;
use super::composite::{self, SaveWithBackup};
use super::health::HealthCheck;
use super::outcome::{Outcome, StoreError};

/// Write side of a pipeline.
pub trait DataSaver: HealthCheck {
    /// Registered type name (e.g., "parquet").
    fn name(&self) -> &str;

    /// Persist `data` under `identifier`.
    ///
    /// `Ok(Outcome::Success)` means the data is durably stored.
    /// `Ok(Outcome::Failure)` is a recoverable rejection (validation, policy).
    /// `Err` is reserved for I/O faults.
    fn save_data(&self, data: &DataFrame, identifier: &str) -> Result<Outcome, StoreError>;

    /// Save, then back up the freshly persisted data.
    ///
    /// Success only when both steps succeed. See [`composite::save_with_backup`].
    fn save_with_backup(
        &self,
        data: &DataFrame,
        identifier: &str,
        backup: &dyn DataBackup,
    ) -> SaveWithBackup {
        composite::save_with_backup(self, backup, data, identifier)
    }
}
