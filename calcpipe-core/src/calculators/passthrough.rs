//! Calculator that copies datasets through unchanged apart from null filling.
//! Useful for staging raw data into a saver with backups.

use std::path::Path;

use super::grading::fill_numeric_nulls;
use crate::components::{
    ArgsError, CalculationError, CalculationResult, Calculator, ComponentArgs, DataBackup,
    DataSaver, DataSource, HealthCheck,
};
use crate::pipeline::run_units;

#[derive(Debug, Clone, Default)]
pub struct PassthroughCalculator {
    destination_prefix: String,
}

impl PassthroughCalculator {
    pub fn new(destination_prefix: impl Into<String>) -> Self {
        Self {
            destination_prefix: destination_prefix.into(),
        }
    }

    pub fn from_args(args: &ComponentArgs) -> Result<Self, ArgsError> {
        Ok(Self::new(
            args.str_param("destination_prefix")?.unwrap_or_default(),
        ))
    }

    pub fn destination(&self, identifier: &str) -> String {
        let stem = Path::new(identifier)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(identifier);
        format!("{}{stem}", self.destination_prefix)
    }
}

impl HealthCheck for PassthroughCalculator {
    fn health_check(&self) -> bool {
        true
    }
}

impl Calculator for PassthroughCalculator {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn run_complete_calculation(
        &self,
        source: &dyn DataSource,
        saver: &dyn DataSaver,
        backup: &dyn DataBackup,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<CalculationResult>, CalculationError> {
        run_units(
            self.name(),
            source,
            saver,
            backup,
            identifiers,
            |id| self.destination(id),
            fill_numeric_nulls,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryBackup, MemoryStore};
    use crate::components::DataSource as _;
    use polars::prelude::*;

    #[test]
    fn destination_uses_stem_and_prefix() {
        assert_eq!(PassthroughCalculator::default().destination("prices.csv"), "prices");
        assert_eq!(
            PassthroughCalculator::new("staged_").destination("prices"),
            "staged_prices"
        );
    }

    #[test]
    fn copies_with_nulls_filled() {
        let store = MemoryStore::new("memory");
        store.insert(
            "prices.csv",
            df!("close" => &[Some(1.5f64), None]).unwrap(),
        );
        let backup = MemoryBackup::new(store.clone());

        let results = PassthroughCalculator::new("staged_")
            .run_complete_calculation(&store, &store, &backup, None)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        let staged = store.get_data("staged_prices").unwrap();
        assert_eq!(staged.column("close").unwrap().null_count(), 0);
    }

    #[test]
    fn from_args_defaults_to_no_prefix() {
        let calc = PassthroughCalculator::from_args(&ComponentArgs::new()).unwrap();
        assert_eq!(calc.destination("x.parquet"), "x");
    }
}
