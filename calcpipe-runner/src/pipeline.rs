//! Pipeline assembly and orchestration.
//!
//! A `Pipeline` owns one instance of each configured component, built through
//! the registry. `run()` is the high-level entry point used by the CLI:
//! probe, optionally scrape, then hand the components to the calculator.

use calcpipe_core::components::{
    probe_all, BackupLocation, CalculationError, CalculationResult, Calculator, ComponentKind,
    DataBackup, DataSaver, DataSource, FactoryError, HealthReport, Outcome, ProbeTarget, Registry,
    Scraper, StoreError,
};
use calcpipe_core::pipeline::{summarize, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ComponentSpec, ConfigError, PipelineConfig, RunId};

/// Current schema version for persisted run reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("[{section}] could not be constructed: {source}")]
    Component {
        section: ComponentKind,
        #[source]
        source: FactoryError,
    },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("unhealthy components: {}", .0.join(", "))]
    Unhealthy(Vec<String>),
    #[error("calculation aborted: {0}")]
    Calculation(#[from] CalculationError),
    #[error("no scraper configured")]
    NoScraper,
    #[error("backup failed: {0}")]
    Backup(#[from] StoreError),
}

/// What the optional scrape step did before the calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRecord {
    pub scraper: String,
    pub outcome: Outcome,
}

/// Complete result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub calculator: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub health: Option<HealthReport>,
    pub scrape: Option<ScrapeRecord>,
    pub results: Vec<CalculationResult>,
    pub summary: RunSummary,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.summary.all_succeeded()
    }
}

pub struct Pipeline {
    run_id: RunId,
    identifiers: Option<Vec<String>>,
    probe_before_run: bool,
    source: Box<dyn DataSource>,
    saver: Box<dyn DataSaver>,
    backup: Box<dyn DataBackup>,
    calculator: Box<dyn Calculator>,
    scraper: Option<Box<dyn Scraper>>,
}

fn section<T: ?Sized>(
    kind: ComponentKind,
    spec: &ComponentSpec,
    create: impl FnOnce(&str, &calcpipe_core::ComponentArgs) -> Result<Box<T>, FactoryError>,
) -> Result<Box<T>, AssembleError> {
    create(&spec.type_name, &spec.args).map_err(|source| AssembleError::Component {
        section: kind,
        source,
    })
}

impl Pipeline {
    /// Construct every configured component through `registry`.
    pub fn assemble(registry: &Registry, config: &PipelineConfig) -> Result<Self, AssembleError> {
        config.validate()?;

        let source = section(ComponentKind::Source, &config.source, |t, a| {
            registry.create_source(t, a)
        })?;
        let saver = section(ComponentKind::Saver, &config.saver, |t, a| {
            registry.create_saver(t, a)
        })?;
        let backup = section(ComponentKind::Backup, &config.backup, |t, a| {
            registry.create_backup(t, a)
        })?;
        let calculator = section(ComponentKind::Calculator, &config.calculator, |t, a| {
            registry.create_calculator(t, a)
        })?;
        let scraper = config
            .scraper
            .as_ref()
            .map(|spec| {
                section(ComponentKind::Scraper, spec, |t, a| {
                    registry.create_scraper(t, a)
                })
            })
            .transpose()?;

        Ok(Self {
            run_id: config.run_id()?,
            identifiers: config.identifiers.clone(),
            probe_before_run: config.probe_before_run,
            source,
            saver,
            backup,
            calculator,
            scraper,
        })
    }

    /// Build a pipeline from already-constructed components.
    pub fn from_parts(
        run_id: impl Into<RunId>,
        source: Box<dyn DataSource>,
        saver: Box<dyn DataSaver>,
        backup: Box<dyn DataBackup>,
        calculator: Box<dyn Calculator>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            identifiers: None,
            probe_before_run: true,
            source,
            saver,
            backup,
            calculator,
            scraper: None,
        }
    }

    pub fn with_scraper(mut self, scraper: Box<dyn Scraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub fn with_identifiers(mut self, identifiers: Option<Vec<String>>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn with_probe_before_run(mut self, probe_before_run: bool) -> Self {
        self.probe_before_run = probe_before_run;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Probe every component concurrently.
    pub fn probe(&self) -> HealthReport {
        let source = self.source.as_ref();
        let saver = self.saver.as_ref();
        let backup = self.backup.as_ref();
        let calculator = self.calculator.as_ref();

        let mut targets = vec![
            ProbeTarget::new(ComponentKind::Source, source.name(), move || {
                source.health_check()
            }),
            ProbeTarget::new(ComponentKind::Saver, saver.name(), move || {
                saver.health_check()
            }),
            ProbeTarget::new(ComponentKind::Backup, backup.name(), move || {
                backup.health_check()
            }),
            ProbeTarget::new(ComponentKind::Calculator, calculator.name(), move || {
                calculator.health_check()
            }),
        ];
        if let Some(scraper) = self.scraper.as_deref() {
            targets.push(ProbeTarget::new(
                ComponentKind::Scraper,
                scraper.name(),
                move || scraper.health_check(),
            ));
        }

        let report = probe_all(targets);
        for component in report.unhealthy() {
            warn!(kind = %component.kind, component = %component.name, "component unhealthy");
        }
        report
    }

    /// Scrape one named source, or every source when `None`.
    pub fn scrape(&self, source: Option<&str>) -> Result<Outcome, RunError> {
        let scraper = self.scraper.as_deref().ok_or(RunError::NoScraper)?;
        let outcome = match source {
            Some(name) => scraper.scrape_single_source(name, self.saver.as_ref()),
            None => scraper.scrape_data(self.saver.as_ref()),
        };
        match outcome.reason() {
            None => info!(scraper = scraper.name(), "scrape completed"),
            Some(reason) => warn!(scraper = scraper.name(), %reason, "scrape failed"),
        }
        Ok(outcome)
    }

    /// Snapshot everything the backup service can see.
    pub fn backup_all(&self) -> Result<Vec<(String, BackupLocation)>, RunError> {
        let created = self.backup.backup_all()?;
        info!(backup = self.backup.name(), count = created.len(), "backup-all completed");
        Ok(created)
    }

    /// Probe (if enabled), scrape (if configured), then run the calculation.
    ///
    /// `only` overrides the configured identifiers.
    pub fn run(&self, only: Option<&[String]>) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        info!(run_id = %self.run_id, calculator = self.calculator.name(), "pipeline run starting");

        let health = if self.probe_before_run {
            let report = self.probe();
            if !report.all_healthy() {
                let names: Vec<String> = report
                    .unhealthy()
                    .map(|c| format!("{} '{}'", c.kind, c.name))
                    .collect();
                error!(run_id = %self.run_id, unhealthy = ?names, "refusing to run");
                return Err(RunError::Unhealthy(names));
            }
            Some(report)
        } else {
            None
        };

        // A failed scrape leaves whatever data is already in place; the
        // calculation still runs over it.
        let scrape = match self.scraper.as_deref() {
            Some(scraper) => Some(ScrapeRecord {
                scraper: scraper.name().to_string(),
                outcome: self.scrape(None)?,
            }),
            None => None,
        };

        let identifiers = only.or(self.identifiers.as_deref());
        let results = self.calculator.run_complete_calculation(
            self.source.as_ref(),
            self.saver.as_ref(),
            self.backup.as_ref(),
            identifiers,
        )?;
        let summary = summarize(&results);

        info!(
            run_id = %self.run_id,
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            "pipeline run finished"
        );

        Ok(RunReport {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            calculator: self.calculator.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            health,
            scrape,
            results,
            summary,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("run_id", &self.run_id)
            .field("source", &self.source.name())
            .field("saver", &self.saver.name())
            .field("backup", &self.backup.name())
            .field("calculator", &self.calculator.name())
            .field("scraper", &self.scraper.as_ref().map(|s| s.name()))
            .finish()
    }
}
