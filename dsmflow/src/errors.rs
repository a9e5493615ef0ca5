//! Error types for the dsmflow orchestration library.
//!
//! Only conditions that stop the batch outright surface as errors here.
//! Stage failures, fill failures, and per-item faults are modeled as
//! outcome data and never propagate past their unit of work.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dsmflow operations.
#[derive(Debug, Error)]
pub enum DsmflowError {
    /// The input directory contained no recognized point-cloud files.
    #[error("{0}")]
    EmptyInputDirectory(#[from] EmptyInputDirectoryError),

    /// A configuration value failed validation.
    #[error("{0}")]
    Config(#[from] ConfigValidationError),

    /// Serialization of a pipeline document failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when the input directory holds no `.laz`/`.las` files.
///
/// This is the only precondition that aborts a batch before any work.
#[derive(Debug, Clone, Error)]
#[error("no .laz/.las files found in input directory '{}'", directory.display())]
pub struct EmptyInputDirectoryError {
    /// The directory that was scanned.
    pub directory: PathBuf,
}

impl EmptyInputDirectoryError {
    /// Creates a new empty-input-directory error.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

/// Error raised when a configuration value is outside its allowed range.
#[derive(Debug, Clone, Error)]
#[error("invalid {field}: {message}")]
pub struct ConfigValidationError {
    /// The offending configuration field.
    pub field: String,
    /// Description of the violation.
    pub message: String,
}

impl ConfigValidationError {
    /// Creates a new configuration validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
