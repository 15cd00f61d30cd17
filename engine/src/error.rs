//! Error types for the relocation engine.
//!
//! `EngineError` represents run-level failures that halt the whole relocation.
//! A failure scoped to one file is a `FileError`; it is carried inside
//! `RelocateOutcome::Failed` and only becomes an `EngineError` when the
//! direction's policy escalates it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{FileState, Side, TransferDirection};

/// Errors that stop a relocation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The share root cannot be reached (not mounted, offline, access denied)
    #[error("Cannot reach share {}: {source}", .root.display())]
    Connection { root: PathBuf, source: io::Error },

    /// A folder listed in the configuration cannot be enumerated
    #[error("Failed to list {side} folder {}: {source}", .path.display())]
    Listing {
        side: Side,
        path: PathBuf,
        source: io::Error,
    },

    /// A per-file failure escalated because the direction's policy is `abort`
    #[error("{direction} aborted: {source}")]
    FileAborted {
        direction: TransferDirection,
        #[source]
        source: FileError,
    },

    /// Too many files failed in a row
    #[error("Aborting after {count} consecutive file failures; last: {last}")]
    TooManyFailures { count: u32, last: FileError },

    /// The run was asked to do something it cannot (e.g. an empty folder list)
    #[error("Invalid relocation plan: {reason}")]
    InvalidPlan { reason: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Connection { source, .. } | Self::Listing { source, .. } => source.raw_os_error(),
            Self::FileAborted { source, .. } => source.raw_os_error(),
            Self::TooManyFailures { last, .. } => last.raw_os_error(),
            Self::InvalidPlan { .. } => None,
        }
    }
}

/// A failure scoped to a single file.
///
/// `stage` is the state the file could not reach.
#[derive(Debug, Error)]
#[error("{stage} failed for {}: {source}", .path.display())]
pub struct FileError {
    pub stage: FileState,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileError {
    pub fn new(stage: FileState, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FileError {
            stage,
            path: path.into(),
            source,
        }
    }

    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }
}

/// Errors raised while reading or validating the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
