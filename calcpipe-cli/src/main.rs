//! calcpipe CLI: registry listing, health probes, runs and maintenance.
//!
//! Commands:
//! - `list`: registered component type names per kind
//! - `health`: probe every component of a configured pipeline
//! - `run`: execute a configured pipeline and write a JSON report
//! - `backup-all`: snapshot everything the configured backup can see
//! - `scrape`: pull external data through the configured scraper

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calcpipe_core::components::{ComponentKind, Registry, UnitStatus};
use calcpipe_runner::{write_report, Pipeline, PipelineConfig, RunReport};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calcpipe", about = "calcpipe: pluggable batch calculation pipelines")]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered component types.
    List {
        /// Only this kind: source, saver, backup, calculator or scraper.
        #[arg(long)]
        kind: Option<ComponentKind>,
    },
    /// Probe every component of a pipeline.
    Health {
        /// Path to a pipeline TOML config.
        #[arg(long)]
        config: PathBuf,
    },
    /// Run a pipeline.
    Run {
        /// Path to a pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Process only these identifiers (overrides the config).
        #[arg(long, num_args = 1..)]
        only: Vec<String>,

        /// Output directory for the run report.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,
    },
    /// Back up every persisted dataset.
    BackupAll {
        /// Path to a pipeline TOML config.
        #[arg(long)]
        config: PathBuf,
    },
    /// Scrape external data into the configured saver.
    Scrape {
        /// Path to a pipeline TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Scrape only this source.
        #[arg(long)]
        source: Option<String>,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let registry = Registry::builtin().context("failed to register built-in components")?;

    match cli.command {
        Commands::List { kind } => run_list(&registry, kind),
        Commands::Health { config } => run_health(&registry, &config),
        Commands::Run {
            config,
            only,
            output_dir,
        } => run_pipeline(&registry, &config, only, &output_dir),
        Commands::BackupAll { config } => run_backup_all(&registry, &config),
        Commands::Scrape { config, source } => run_scrape(&registry, &config, source.as_deref()),
    }
}

fn assemble(registry: &Registry, config_path: &Path) -> Result<Pipeline> {
    let config = PipelineConfig::load(config_path)?;
    let pipeline = Pipeline::assemble(registry, &config)
        .with_context(|| format!("failed to assemble {}", config_path.display()))?;
    info!(run_id = pipeline.run_id(), config = %config_path.display(), "pipeline assembled");
    Ok(pipeline)
}

fn run_list(registry: &Registry, kind: Option<ComponentKind>) -> Result<()> {
    let kinds: Vec<ComponentKind> = match kind {
        Some(kind) => vec![kind],
        None => ComponentKind::ALL.to_vec(),
    };
    for kind in kinds {
        println!("{:<12} {}", kind.as_str(), registry.list(kind).join(", "));
    }
    Ok(())
}

fn run_health(registry: &Registry, config_path: &Path) -> Result<()> {
    let report = assemble(registry, config_path)?.probe();

    for component in &report.components {
        let status = if component.healthy { "ok" } else { "DOWN" };
        println!("{:<12} {:<16} {status}", component.kind.as_str(), component.name);
    }

    if !report.all_healthy() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_pipeline(
    registry: &Registry,
    config_path: &Path,
    only: Vec<String>,
    output_dir: &Path,
) -> Result<()> {
    let pipeline = assemble(registry, config_path)?;
    let only = (!only.is_empty()).then_some(only);

    let report = pipeline.run(only.as_deref())?;
    print_summary(&report);

    let path = write_report(&report, output_dir)
        .with_context(|| format!("failed to write report to {}", output_dir.display()))?;
    println!("Report saved to: {}", path.display());

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("Run {} ({})", report.run_id, report.calculator);
    if let Some(scrape) = &report.scrape {
        match scrape.outcome.reason() {
            None => println!("  scrape      {} ok", scrape.scraper),
            Some(reason) => println!("  scrape      {} FAILED: {reason}", scrape.scraper),
        }
    }
    for result in &report.results {
        match &result.status {
            UnitStatus::Completed { rows, backup } => println!(
                "  ok          {} -> {} ({rows} rows, backup {backup})",
                result.identifier, result.destination
            ),
            UnitStatus::Failed { stage, reason } => println!(
                "  FAILED      {} [{stage:?}]: {reason}",
                result.identifier
            ),
        }
    }
    println!(
        "  {} total, {} completed, {} failed",
        report.summary.total, report.summary.completed, report.summary.failed
    );
}

fn run_backup_all(registry: &Registry, config_path: &Path) -> Result<()> {
    let created = assemble(registry, config_path)?.backup_all()?;
    for (identifier, location) in &created {
        println!("{identifier} -> {location}");
    }
    println!("{} snapshot(s) created", created.len());
    Ok(())
}

fn run_scrape(registry: &Registry, config_path: &Path, source: Option<&str>) -> Result<()> {
    let outcome = assemble(registry, config_path)?.scrape(source)?;
    match outcome.reason() {
        None => println!("Scrape completed"),
        Some(reason) => {
            eprintln!("Scrape failed: {reason}");
            std::process::exit(1);
        }
    }
    Ok(())
}
