//! calcpipe core: pluggable components for batch calculation pipelines.
//!
//! This crate contains:
//! - Component contracts (data source, saver, backup, calculator, scraper)
//!   and the health check protocol they share
//! - The save-with-backup composite operation
//! - A type-name keyed registry that constructs components from arguments
//! - The per-identifier pipeline convention calculators follow
//! - Built-in backends (file store, file backup, memory, HTTP CSV scraper)
//! - Built-in calculators (AAA ratings, passthrough)

pub mod backends;
pub mod calculators;
pub mod components;
pub mod pipeline;

pub use components::{
    BackupLocation, BackupOutcome, CalculationError, CalculationResult, Calculator, Component,
    ComponentArgs, ComponentKind, DataBackup, DataSaver, DataSource, FactoryError, HealthCheck,
    HealthReport, Outcome, Registry, RegistryBuilder, SaveWithBackup, Scraper, StoreError,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: components can be shared with worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send + ?Sized>() {}
        fn require_sync<T: Sync + ?Sized>() {}

        // Contracts
        require_send::<dyn DataSource>();
        require_sync::<dyn DataSource>();
        require_send::<dyn DataSaver>();
        require_sync::<dyn DataSaver>();
        require_send::<dyn DataBackup>();
        require_sync::<dyn DataBackup>();
        require_send::<dyn Calculator>();
        require_sync::<dyn Calculator>();
        require_send::<dyn Scraper>();
        require_sync::<dyn Scraper>();

        // Registry
        require_send::<Registry>();
        require_sync::<Registry>();
        require_send::<Component>();

        // Backends
        require_send::<backends::FileStore>();
        require_sync::<backends::FileStore>();
        require_send::<backends::FileBackup>();
        require_sync::<backends::FileBackup>();
        require_send::<backends::MemoryStore>();
        require_sync::<backends::MemoryStore>();
        require_send::<backends::HttpCsvScraper>();
        require_sync::<backends::HttpCsvScraper>();
        require_send::<backends::CircuitBreaker>();
        require_sync::<backends::CircuitBreaker>();

        // Results
        require_send::<CalculationResult>();
        require_sync::<CalculationResult>();
        require_send::<SaveWithBackup>();
        require_sync::<SaveWithBackup>();
    }

    /// The saver contract offers save-with-backup to every implementation
    /// without it being reimplemented.
    #[test]
    fn save_with_backup_is_provided_on_trait_objects() {
        fn _check(
            saver: &dyn DataSaver,
            backup: &dyn DataBackup,
            data: &polars::prelude::DataFrame,
        ) -> SaveWithBackup {
            saver.save_with_backup(data, "id", backup)
        }
    }
}
