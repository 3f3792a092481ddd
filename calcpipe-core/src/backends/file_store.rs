//! File-backed source and saver (CSV or Parquet).
//!
//! Layout: `{root}/{identifier}.{ext}` plus an optional metadata sidecar
//! `{root}/{identifier}.meta.json`.
//!
//! Features:
//! - Atomic writes (serialize to memory, write `.tmp`, rename into place)
//! - Metadata sidecar (row count, columns, BLAKE3 of the written bytes)
//! - Validation: empty datasets and path-like identifiers are rejected as
//!   recoverable failures, not errors

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{file_name_for, stem_of, validate_identifier};
use crate::components::{
    ArgsError, ComponentArgs, DataSaver, DataSource, HealthCheck, Outcome, StoreError,
};

/// On-disk encoding of a `FileStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }
}

/// Metadata sidecar written next to every saved dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMeta {
    pub identifier: String,
    pub format: FileFormat,
    pub rows: usize,
    pub columns: Vec<String>,
    pub data_hash: String,
    pub saved_at: chrono::NaiveDateTime,
}

/// Directory of CSV or Parquet files, readable and writable by identifier.
#[derive(Debug, Clone)]
pub struct FileStore {
    name: String,
    root: PathBuf,
    format: FileFormat,
    sidecar: bool,
}

impl FileStore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            format,
            sidecar: true,
        }
    }

    /// Construct from registry arguments: `root` (required), `sidecar` (default true).
    pub fn from_args(
        name: &str,
        format: FileFormat,
        args: &ComponentArgs,
    ) -> Result<Self, ArgsError> {
        let root = args.path_param("root")?;
        let sidecar = args.bool_param("sidecar", true)?;
        Ok(Self::new(name, root, format).with_sidecar(sidecar))
    }

    pub fn with_sidecar(mut self, sidecar: bool) -> Self {
        self.sidecar = sidecar;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Path of the data file for `identifier`.
    pub fn data_path(&self, identifier: &str) -> PathBuf {
        self.root
            .join(file_name_for(identifier, self.format.extension()))
    }

    fn meta_path(&self, identifier: &str) -> PathBuf {
        self.root.join(format!(
            "{}.meta.json",
            stem_of(identifier, self.format.extension())
        ))
    }

    /// Read the metadata sidecar for `identifier`, if one exists.
    pub fn get_meta(&self, identifier: &str) -> Option<SaveMeta> {
        let content = fs::read_to_string(self.meta_path(identifier)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn encode(&self, data: &DataFrame) -> PolarsResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut df = data.clone();
        match self.format {
            FileFormat::Csv => CsvWriter::new(&mut buffer)
                .include_header(true)
                .finish(&mut df)?,
            FileFormat::Parquet => {
                ParquetWriter::new(&mut buffer).finish(&mut df)?;
            }
        }
        Ok(buffer)
    }

    fn decode(&self, path: &Path) -> PolarsResult<DataFrame> {
        match self.format {
            FileFormat::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish(),
            FileFormat::Parquet => {
                let file = fs::File::open(path)?;
                ParquetReader::new(file).finish()
            }
        }
    }

    /// Write the sidecar to `{stem}.meta.json.tmp`; the caller renames it
    /// into place once the data file is committed.
    fn stage_meta(
        &self,
        identifier: &str,
        data: &DataFrame,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let meta = SaveMeta {
            identifier: identifier.to_string(),
            format: self.format,
            rows: data.height(),
            columns: data
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            data_hash: blake3::hash(bytes).to_hex().to_string(),
            saved_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::write(identifier, format!("meta serialization: {e}")))?;
        let tmp_path = self.meta_path(identifier).with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| StoreError::write(identifier, format!("meta write: {e}")))?;
        Ok(tmp_path)
    }

    /// Move a staged sidecar into place. The data file is already committed,
    /// so a failure here only drops the sidecar.
    fn commit_meta(&self, identifier: &str, staged: &Path) {
        let meta_path = self.meta_path(identifier);
        if let Err(e) = fs::rename(staged, &meta_path) {
            warn!(
                saver = %self.name,
                identifier,
                error = %e,
                "failed to commit metadata sidecar"
            );
            let _ = fs::remove_file(staged);
            // A leftover sidecar would describe the replaced data.
            let _ = fs::remove_file(&meta_path);
        }
    }
}

impl HealthCheck for FileStore {
    fn health_check(&self) -> bool {
        self.root.is_dir()
    }
}

impl DataSource for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_data(&self, identifier: &str) -> Result<DataFrame, StoreError> {
        validate_identifier(identifier).map_err(|reason| StoreError::read(identifier, reason))?;

        let path = self.data_path(identifier);
        if !path.is_file() {
            return Err(StoreError::not_found(identifier));
        }

        debug!(source = %self.name, path = %path.display(), "reading dataset");
        self.decode(&path)
            .map_err(|e| StoreError::read(identifier, e))
    }

    fn list_sources(&self) -> Result<Vec<String>, StoreError> {
        let root = self.root.display().to_string();
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::read(&root, e))?;

        let mut identifiers = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::read(&root, e))?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(self.format.extension())
            {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                identifiers.push(file_name.to_string());
            }
        }

        identifiers.sort();
        Ok(identifiers)
    }
}

impl DataSaver for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn save_data(&self, data: &DataFrame, identifier: &str) -> Result<Outcome, StoreError> {
        if let Err(reason) = validate_identifier(identifier) {
            warn!(saver = %self.name, identifier, %reason, "rejecting save");
            return Ok(Outcome::failure(reason));
        }
        if data.height() == 0 {
            return Ok(Outcome::failure("refusing to save an empty dataset"));
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| StoreError::write(identifier, format!("failed to create dir: {e}")))?;

        let bytes = self
            .encode(data)
            .map_err(|e| StoreError::write(identifier, format!("encode: {e}")))?;

        let path = self.data_path(identifier);
        let tmp_path = path.with_extension(format!("{}.tmp", self.format.extension()));
        fs::write(&tmp_path, &bytes)
            .map_err(|e| StoreError::write(identifier, format!("write: {e}")))?;

        let staged_meta = if self.sidecar {
            match self.stage_meta(identifier, data, &bytes) {
                Ok(staged) => Some(staged),
                Err(e) => {
                    let _ = fs::remove_file(&tmp_path);
                    return Err(e);
                }
            }
        } else {
            None
        };

        // Atomic rename
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            if let Some(staged) = &staged_meta {
                let _ = fs::remove_file(staged);
            }
            StoreError::write(identifier, format!("atomic rename failed: {e}"))
        })?;

        if let Some(staged) = staged_meta {
            self.commit_meta(identifier, &staged);
        }

        debug!(saver = %self.name, path = %path.display(), rows = data.height(), "dataset saved");
        Ok(Outcome::Success)
    }
}
