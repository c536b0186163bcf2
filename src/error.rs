//! Centralized error types for mailias.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailias library.
///
/// Only store and source faults are errors. Malformed headers, dates and
/// addresses are handled where they occur and never surface here.
#[derive(Error, Debug)]
pub enum AliasError {
    /// The alias file does not exist and the run may not create it.
    #[error("Alias file not found: {0}")]
    StoreNotFound(PathBuf),

    /// The alias file exists but could not be read.
    #[error("Cannot read alias file '{path}': {source}")]
    StoreRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The alias file (or its backup or temporary copy) could not be written.
    #[error("Cannot write alias file '{path}': {source}")]
    StoreWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A mail source directory could not be listed.
    #[error("Cannot read mail directory '{path}': {source}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single message could not be read.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid or contradictory configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, AliasError>`.
pub type Result<T> = std::result::Result<T, AliasError>;

impl AliasError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `StoreWrite` variant from a path and an `io::Error`.
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a `SourceRead` variant from a path and an `io::Error`.
    pub fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    /// True for errors that concern the alias file itself.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::StoreNotFound(_) | Self::StoreRead { .. } | Self::StoreWrite { .. }
        )
    }
}
