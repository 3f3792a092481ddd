//! Component contracts and the machinery shared by all of them.
//!
//! Five capability sets, each a trait a backend implements in full:
//! - Data source: reads datasets by identifier
//! - Data saver: persists datasets, plus the save-with-backup composite
//! - Backup service: snapshots persisted data
//! - Calculator: drives one complete processing run
//! - Scraper (optional): pulls external data into a saver
//!
//! Plus the health check protocol every component exposes, and the
//! type-name keyed registry that constructs them.

pub mod backup;
pub mod calculator;
pub mod composite;
pub mod factory;
pub mod health;
pub mod outcome;
pub mod saver;
pub mod scraper;
pub mod source;

pub use backup::{BackupLocation, BackupOutcome, DataBackup};
pub use calculator::{CalculationError, CalculationResult, Calculator, FailureStage, UnitStatus};
pub use composite::{save_with_backup, SaveWithBackup};
pub use factory::{
    ArgsError, Component, ComponentArgs, ComponentKind, FactoryError, Registry, RegistryBuilder,
};
pub use health::{probe, probe_all, ComponentHealth, HealthCheck, HealthReport, ProbeTarget};
pub use outcome::{Outcome, StoreError};
pub use saver::DataSaver;
pub use scraper::Scraper;
pub use source::DataSource;
