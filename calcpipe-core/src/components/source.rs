//! Data source contract.

use polars::prelude::DataFrame;

use super::health::HealthCheck;
use super::outcome::StoreError;

/// Read side of a pipeline.
///
/// Identifiers are opaque to the caller; each backend decides what they name
/// (a file, a table, a symbol).
pub trait DataSource: HealthCheck {
    /// Registered type name (e.g., "csv").
    fn name(&self) -> &str;

    /// Load the dataset behind `identifier`.
    ///
    /// Fails with `StoreError::NotFound` for an unknown identifier and
    /// `StoreError::Read` on I/O failure.
    fn get_data(&self, identifier: &str) -> Result<DataFrame, StoreError>;

    /// Every identifier this source can currently serve.
    fn list_sources(&self) -> Result<Vec<String>, StoreError>;
}
