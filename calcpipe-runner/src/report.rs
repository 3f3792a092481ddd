//! Persisted run reports.
//!
//! Layout: `{dir}/{run_id}.json`, written atomically (temp file + rename).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::pipeline::RunReport;

/// Write `report` as pretty JSON under `dir`, creating it if needed.
pub fn write_report(report: &RunReport, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(report)?;
    let path = dir.join(format!("{}.json", report.run_id));
    let tmp_path = dir.join(format!("{}.json.tmp", report.run_id));

    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, &path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        e
    })?;
    Ok(path)
}

/// Read a report back from disk.
pub fn read_report(path: &Path) -> io::Result<RunReport> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
