//! Built-in storage, backup and scraper backends.

pub mod circuit_breaker;
pub mod file_backup;
pub mod file_store;
pub mod http_csv;
pub mod memory;

pub use circuit_breaker::CircuitBreaker;
pub use file_backup::FileBackup;
pub use file_store::{FileFormat, FileStore, SaveMeta};
pub use http_csv::{HttpCsvScraper, ScrapeError};
pub use memory::{MemoryBackup, MemoryStore};

use crate::components::{
    DataBackup, DataSaver, DataSource, FactoryError, RegistryBuilder, Scraper,
};

/// Register `csv`/`parquet` sources and savers, `file_copy` backup and the
/// `http_csv` scraper.
pub fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), FactoryError> {
    for format in [FileFormat::Csv, FileFormat::Parquet] {
        let name = format.extension();
        builder
            .register_source(name, move |args| {
                Ok(Box::new(FileStore::from_args(name, format, args)?) as Box<dyn DataSource>)
            })?
            .register_saver(name, move |args| {
                Ok(Box::new(FileStore::from_args(name, format, args)?) as Box<dyn DataSaver>)
            })?;
    }

    builder
        .register_backup("file_copy", |args| {
            Ok(Box::new(FileBackup::from_args(args)?) as Box<dyn DataBackup>)
        })?
        .register_scraper("http_csv", |args| {
            Ok(Box::new(HttpCsvScraper::from_args(args)?) as Box<dyn Scraper>)
        })?;

    Ok(())
}

/// Reject identifiers that could escape a backend's root directory.
pub(crate) fn validate_identifier(identifier: &str) -> Result<(), String> {
    if identifier.trim().is_empty() {
        return Err("identifier is empty".into());
    }
    if identifier.contains('/') || identifier.contains('\\') || identifier.contains("..") {
        return Err(format!("identifier '{identifier}' must not contain path components"));
    }
    Ok(())
}

/// `identifier` with `.{ext}` appended unless already present.
pub(crate) fn file_name_for(identifier: &str, ext: &str) -> String {
    if identifier.ends_with(&format!(".{ext}")) {
        identifier.to_string()
    } else {
        format!("{identifier}.{ext}")
    }
}

/// `identifier` without a trailing `.{ext}`.
pub(crate) fn stem_of<'a>(identifier: &'a str, ext: &str) -> &'a str {
    identifier
        .strip_suffix(ext)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(identifier)
}

#[cfg(test)]
pub(crate) fn test_dir(label: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "calcpipe_{label}_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
