//! Shared result vocabulary for component operations.
//!
//! Two channels exist side by side:
//! - `Outcome` for anticipated failures (a rejected write, an unavailable
//!   upstream). These are values the caller inspects, never errors.
//! - `StoreError` for faults inside a backend (unknown identifier, I/O
//!   failure). These propagate with `?`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Success or an expected, recoverable failure with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { reason: String },
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure reason, `None` on success.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure { reason } => Some(reason),
        }
    }
}

impl From<bool> for Outcome {
    fn from(ok: bool) -> Self {
        if ok {
            Outcome::Success
        } else {
            Outcome::failure("operation reported failure")
        }
    }
}

/// Backend faults surfaced by sources, savers and backups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identifier not found: {identifier}")]
    NotFound { identifier: String },

    #[error("read failed for '{identifier}': {reason}")]
    Read { identifier: String, reason: String },

    #[error("write failed for '{identifier}': {reason}")]
    Write { identifier: String, reason: String },
}

impl StoreError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        StoreError::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn read(identifier: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Read {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(identifier: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Write {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_reason() {
        let outcome = Outcome::failure("schema mismatch");
        assert!(!outcome.is_success());
        assert_eq!(outcome.reason(), Some("schema mismatch"));
    }

    #[test]
    fn bool_conversion() {
        assert!(Outcome::from(true).is_success());
        assert!(!Outcome::from(false).is_success());
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_string(&Outcome::failure("x")).unwrap();
        assert_eq!(json, r#"{"status":"failure","reason":"x"}"#);
        let json = serde_json::to_string(&Outcome::Success).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::not_found("AAA - energy.csv");
        assert_eq!(err.to_string(), "identifier not found: AAA - energy.csv");
        let err = StoreError::write("AAA_energy", "disk full");
        assert_eq!(err.to_string(), "write failed for 'AAA_energy': disk full");
    }
}
