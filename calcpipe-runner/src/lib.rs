//! calcpipe runner: pipeline assembly, health probing and run orchestration.
//!
//! This crate builds on `calcpipe-core` to provide:
//! - TOML pipeline configuration with content-hashed run ids
//! - Pipeline assembly through the component registry
//! - Concurrent health probing before a run
//! - Run orchestration (probe, scrape, calculate) with JSON reports

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{ComponentSpec, ConfigError, PipelineConfig, RunId};
pub use pipeline::{AssembleError, Pipeline, RunError, RunReport, ScrapeRecord};
pub use report::{read_report, write_report};
