//! Save-with-backup: the one composite operation shared by every saver/backup pair.
//!
//! State machine:
//!
//! ```text
//! Start ──save ok──▶ Saved ──backup created──▶ BackedUp      (success)
//!   │                  └────backup skipped/err─▶ BackupFailed (partial failure)
//!   └──save rejected/err──▶ SaveFailed                         (failure)
//! ```
//!
//! A backup failure never rolls the save back: in `BackupFailed` the dataset
//! is still at its primary location.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::backup::{BackupLocation, BackupOutcome, DataBackup};
use super::outcome::Outcome;
use super::saver::DataSaver;

/// Terminal state of a save-with-backup call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveWithBackup {
    BackedUp { location: BackupLocation },
    SaveFailed { reason: String },
    BackupFailed { reason: String },
}

impl SaveWithBackup {
    /// Both the primary write and its backup exist.
    pub fn is_success(&self) -> bool {
        matches!(self, SaveWithBackup::BackedUp { .. })
    }

    /// The primary write happened, whatever became of the backup.
    pub fn saved(&self) -> bool {
        !matches!(self, SaveWithBackup::SaveFailed { .. })
    }

    pub fn location(&self) -> Option<&BackupLocation> {
        match self {
            SaveWithBackup::BackedUp { location } => Some(location),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SaveWithBackup::BackedUp { .. } => None,
            SaveWithBackup::SaveFailed { reason } | SaveWithBackup::BackupFailed { reason } => {
                Some(reason)
            }
        }
    }
}

/// Save `data` under `identifier`, then back it up.
///
/// The backup is only attempted after a successful save.
pub fn save_with_backup<S>(
    saver: &S,
    backup: &dyn DataBackup,
    data: &DataFrame,
    identifier: &str,
) -> SaveWithBackup
where
    S: DataSaver + ?Sized,
{
    match saver.save_data(data, identifier) {
        Ok(Outcome::Success) => {}
        Ok(Outcome::Failure { reason }) => {
            error!(saver = saver.name(), identifier, %reason, "save rejected, backup skipped");
            return SaveWithBackup::SaveFailed { reason };
        }
        Err(e) => {
            error!(saver = saver.name(), identifier, error = %e, "save failed, backup skipped");
            return SaveWithBackup::SaveFailed {
                reason: e.to_string(),
            };
        }
    }

    match backup.backup_data(identifier) {
        Ok(BackupOutcome::Created { location }) => {
            info!(
                saver = saver.name(),
                backup = backup.name(),
                identifier,
                %location,
                "saved and backed up"
            );
            SaveWithBackup::BackedUp { location }
        }
        Ok(BackupOutcome::Skipped { reason }) => {
            warn!(backup = backup.name(), identifier, %reason, "saved but backup was not performed");
            SaveWithBackup::BackupFailed { reason }
        }
        Err(e) => {
            warn!(backup = backup.name(), identifier, error = %e, "saved but backup failed");
            SaveWithBackup::BackupFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::health::HealthCheck;
    use crate::components::outcome::StoreError;
    use polars::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum SaveMode {
        Accept,
        Reject,
        Fault,
    }

    struct StubSaver {
        mode: SaveMode,
        calls: AtomicUsize,
    }

    impl StubSaver {
        fn new(mode: SaveMode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HealthCheck for StubSaver {
        fn health_check(&self) -> bool {
            true
        }
    }

    impl DataSaver for StubSaver {
        fn name(&self) -> &str {
            "stub"
        }

        fn save_data(&self, _data: &DataFrame, identifier: &str) -> Result<Outcome, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                SaveMode::Accept => Ok(Outcome::Success),
                SaveMode::Reject => Ok(Outcome::failure("validation failed")),
                SaveMode::Fault => Err(StoreError::write(identifier, "disk full")),
            }
        }
    }

    enum BackupMode {
        Create,
        Skip,
        Fault,
    }

    struct StubBackup {
        mode: BackupMode,
        calls: AtomicUsize,
    }

    impl StubBackup {
        fn new(mode: BackupMode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HealthCheck for StubBackup {
        fn health_check(&self) -> bool {
            true
        }
    }

    impl DataBackup for StubBackup {
        fn name(&self) -> &str {
            "stub"
        }

        fn backup_data(&self, identifier: &str) -> Result<BackupOutcome, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                BackupMode::Create => Ok(BackupOutcome::created(format!("bak/{identifier}"))),
                BackupMode::Skip => Ok(BackupOutcome::skipped("nothing to copy")),
                BackupMode::Fault => Err(StoreError::write(identifier, "backup volume offline")),
            }
        }

        fn backup_all(&self) -> Result<Vec<(String, BackupLocation)>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn frame() -> DataFrame {
        df!("ticker" => &["AAPL", "MSFT"], "roe" => &[0.3f64, 0.4]).unwrap()
    }

    #[test]
    fn save_and_backup_succeed() {
        let saver = StubSaver::new(SaveMode::Accept);
        let backup = StubBackup::new(BackupMode::Create);

        let result = saver.save_with_backup(&frame(), "x", &backup);

        assert!(result.is_success());
        assert_eq!(result.location(), Some(&BackupLocation::new("bak/x")));
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_save_never_backs_up() {
        let saver = StubSaver::new(SaveMode::Reject);
        let backup = StubBackup::new(BackupMode::Create);

        let result = saver.save_with_backup(&frame(), "x", &backup);

        assert_eq!(
            result,
            SaveWithBackup::SaveFailed {
                reason: "validation failed".into()
            }
        );
        assert!(!result.saved());
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn save_fault_never_backs_up() {
        let saver = StubSaver::new(SaveMode::Fault);
        let backup = StubBackup::new(BackupMode::Create);

        let result = save_with_backup(&saver, &backup, &frame(), "x");

        assert!(!result.is_success());
        assert!(result.reason().unwrap().contains("disk full"));
        assert_eq!(saver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skipped_backup_is_partial_failure() {
        let saver = StubSaver::new(SaveMode::Accept);
        let backup = StubBackup::new(BackupMode::Skip);

        let result = saver.save_with_backup(&frame(), "x", &backup);

        assert!(!result.is_success());
        assert!(result.saved());
        assert_eq!(result.reason(), Some("nothing to copy"));
    }

    #[test]
    fn backup_fault_is_partial_failure() {
        let saver = StubSaver::new(SaveMode::Accept);
        let backup = StubBackup::new(BackupMode::Fault);

        let result = saver.save_with_backup(&frame(), "x", &backup);

        assert!(matches!(result, SaveWithBackup::BackupFailed { .. }));
        assert!(result.saved());
    }

    #[test]
    fn works_through_trait_objects() {
        let saver: Box<dyn DataSaver> = Box::new(StubSaver::new(SaveMode::Accept));
        let backup: Box<dyn DataBackup> = Box::new(StubBackup::new(BackupMode::Create));

        assert!(saver.save_with_backup(&frame(), "y", backup.as_ref()).is_success());
    }
}
