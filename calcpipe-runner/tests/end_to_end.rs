//! End-to-end: TOML config -> registry-built CSV pipeline -> AAA ratings on
//! disk, with backups and a JSON run report.

use std::fs;
use std::path::Path;

use calcpipe_core::calculators::aaa::CATEGORIES;
use calcpipe_core::components::{ComponentKind, FailureStage, Registry};
use calcpipe_runner::{read_report, write_report, AssembleError, Pipeline, PipelineConfig, RunError};

/// A sector CSV with every rated metric present.
fn write_sector_csv(path: &Path) {
    let metrics: Vec<&str> = CATEGORIES
        .iter()
        .flat_map(|(_, members)| members.iter().copied())
        .collect();

    let mut csv = format!("ticker,{}\n", metrics.join(","));
    for (ticker, base) in [("AAPL", 1.0), ("MSFT", 2.0), ("NVDA", 3.0), ("INTC", 0.5)] {
        let row: Vec<String> = metrics
            .iter()
            .enumerate()
            .map(|(i, _)| format!("{:.2}", base + i as f64 * 0.1))
            .collect();
        csv.push_str(&format!("{ticker},{}\n", row.join(",")));
    }
    fs::write(path, csv).unwrap();
}

fn config_toml(root: &Path, extra: &str) -> String {
    let p = |sub: &str| root.join(sub).display().to_string().replace('\\', "/");
    format!(
        r#"
{extra}

[source]
type = "csv"
root = "{input}"

[saver]
type = "csv"
root = "{output}"

[backup]
type = "file_copy"
data_root = "{output}"
backup_root = "{backup}"
keep_last = 2

[calculator]
type = "aaa"
"#,
        input = p("in"),
        output = p("out"),
        backup = p("backup"),
    )
}

fn setup(extra: &str) -> (tempfile::TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("in")).unwrap();
    fs::create_dir_all(dir.path().join("out")).unwrap();
    write_sector_csv(&dir.path().join("in/AAA - technology.csv"));
    fs::write(dir.path().join("in/AAA - energy.csv"), "ticker,roe\nXOM,0.2\n").unwrap();

    let config = PipelineConfig::from_toml(&config_toml(dir.path(), extra)).unwrap();
    (dir, config)
}

#[test]
fn csv_pipeline_rates_saves_and_backs_up() {
    let (dir, config) = setup("");
    let registry = Registry::builtin().unwrap();
    let pipeline = Pipeline::assemble(&registry, &config).unwrap();

    let health = pipeline.probe();
    assert!(health.all_healthy(), "{health:?}");
    assert_eq!(health.components.len(), 4);
    assert_eq!(health.components[3].kind, ComponentKind::Calculator);

    let report = pipeline.run(None).unwrap();

    // Sorted listing: energy before technology.
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.results[0].identifier, "AAA - energy.csv");
    assert_eq!(report.results[0].failure_stage(), Some(FailureStage::Compute));
    assert!(report.results[1].is_success());
    assert_eq!(report.results[1].destination, "AAA_technology");
    assert!(!report.succeeded());

    let rated = fs::read_to_string(dir.path().join("out/AAA_technology.csv")).unwrap();
    let header = rated.lines().next().unwrap();
    assert!(header.contains("AAA - overall"));
    assert!(header.contains("score - valuation"));
    assert!(dir.path().join("out/AAA_technology.meta.json").is_file());
    assert!(!dir.path().join("out/AAA_energy.csv").exists());

    let snapshots: Vec<_> = fs::read_dir(dir.path().join("backup/AAA_technology"))
        .unwrap()
        .collect();
    assert_eq!(snapshots.len(), 1);

    let path = write_report(&report, &dir.path().join("reports")).unwrap();
    let loaded = read_report(&path).unwrap();
    assert_eq!(loaded.run_id, config.run_id().unwrap());
    assert_eq!(loaded.summary.failed_identifiers, vec!["AAA - energy.csv"]);
}

#[test]
fn configured_identifiers_restrict_the_run() {
    let (dir, config) = setup(r#"identifiers = ["AAA - technology.csv"]"#);
    let pipeline = Pipeline::assemble(&Registry::builtin().unwrap(), &config).unwrap();

    let report = pipeline.run(None).unwrap();
    assert!(report.succeeded());
    assert_eq!(report.summary.total, 1);

    // A second run backs up again and prunes to keep_last.
    for _ in 0..3 {
        pipeline.run(None).unwrap();
    }
    let snapshots = fs::read_dir(dir.path().join("backup/AAA_technology"))
        .unwrap()
        .count();
    assert_eq!(snapshots, 2);
}

#[test]
fn missing_input_directory_fails_probe() {
    let (dir, config) = setup("");
    fs::remove_dir_all(dir.path().join("in")).unwrap();

    let pipeline = Pipeline::assemble(&Registry::builtin().unwrap(), &config).unwrap();
    match pipeline.run(None) {
        Err(RunError::Unhealthy(names)) => assert_eq!(names, vec!["source 'csv'"]),
        other => panic!("expected Unhealthy, got {other:?}"),
    }
}

#[test]
fn backup_all_snapshots_every_output() {
    let (dir, config) = setup(r#"identifiers = ["AAA - technology.csv"]"#);
    let pipeline = Pipeline::assemble(&Registry::builtin().unwrap(), &config).unwrap();
    pipeline.run(None).unwrap();

    let created = pipeline.backup_all().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, "AAA_technology.csv");
    assert!(dir.path().join("backup/AAA_technology").is_dir());
}

#[test]
fn unknown_calculator_fails_assembly() {
    let (_dir, config) = setup("");
    let mut config = config;
    config.calculator.type_name = "nope".into();

    assert!(matches!(
        Pipeline::assemble(&Registry::builtin().unwrap(), &config),
        Err(AssembleError::Component {
            section: ComponentKind::Calculator,
            ..
        })
    ));
}
