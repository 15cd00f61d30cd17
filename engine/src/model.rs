//! Core data model for relocation runs.
//!
//! This module defines the main data structures:
//! - TransferDirection / Side: which tree is the source and which the destination
//! - FileEntry / RelocatePath: one discovered file and where it goes
//! - FileState / RelocateOutcome: the per-file state machine and its result
//! - RelocateOptions / OnFileError: the failure policy of a run
//! - FolderReport / RunReport: counters handed to observers and the CLI

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::checksums::ChecksumAlgorithm;
use crate::error::FileError;

/// Direction of a relocation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TransferDirection {
    /// Local files are copied to the share, local originals deleted
    #[serde(rename = "PUT_FILE", alias = "upload", alias = "UPLOAD", alias = "put_file")]
    Upload,
    /// Share files are copied to the local tree, remote originals deleted
    #[serde(rename = "GET_FILE", alias = "download", alias = "DOWNLOAD", alias = "get_file")]
    Download,
}

impl TransferDirection {
    /// Which side files are read from.
    pub fn source_side(&self) -> Side {
        match self {
            TransferDirection::Upload => Side::Local,
            TransferDirection::Download => Side::Remote,
        }
    }

    /// Which side files are written to.
    pub fn destination_side(&self) -> Side {
        match self {
            TransferDirection::Upload => Side::Remote,
            TransferDirection::Download => Side::Local,
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "Upload"),
            TransferDirection::Download => write!(f, "Download"),
        }
    }
}

/// One of the two trees a run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// An entry returned by a non-recursive directory listing.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Base name within the listed folder, exactly as the share reports it
    pub name: OsString,

    /// Directories are reported but never relocated
    pub is_dir: bool,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// Last modification time, when the share reports one
    pub modified: Option<SystemTime>,
}

/// Where one file lives on each side.
///
/// Both halves hold the same relative path: the remote tree mirrors the local tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatePath {
    pub local: PathBuf,
    pub remote: PathBuf,
}

impl RelocatePath {
    /// Path on the side files are read from.
    pub fn source(&self, direction: TransferDirection) -> &PathBuf {
        match direction.source_side() {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    /// Path on the side files are written to.
    pub fn destination(&self, direction: TransferDirection) -> &PathBuf {
        match direction.destination_side() {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }
}

/// States of the per-file relocate state machine, in order.
///
/// A `FileError` records the state that could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileState {
    /// Discovered by the folder listing
    Listed,
    /// Destination parent directory exists
    DirEnsured,
    /// Source handle open for reading
    SourceOpened,
    /// Destination created (or truncated) for writing
    DestCreated,
    /// All bytes streamed and the destination flushed
    Copied,
    /// Destination checksum matches the source (only when verification is on)
    Verified,
    /// Source removed; the file is relocated
    SourceDeleted,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            FileState::Listed => "list",
            FileState::DirEnsured => "ensure directory",
            FileState::SourceOpened => "open source",
            FileState::DestCreated => "create destination",
            FileState::Copied => "copy",
            FileState::Verified => "verify",
            FileState::SourceDeleted => "delete source",
        };
        write!(f, "{}", step)
    }
}

/// Result of relocating one file.
#[derive(Debug)]
pub enum RelocateOutcome {
    /// Copied and the source deleted
    Relocated { bytes: u64 },
    /// Copied, but the source could not be deleted
    SourceKept { bytes: u64, error: FileError },
    /// Aborted before the copy completed; the source is untouched
    Failed(FileError),
}

impl RelocateOutcome {
    pub fn error(&self) -> Option<&FileError> {
        match self {
            RelocateOutcome::Relocated { .. } => None,
            RelocateOutcome::SourceKept { error, .. } => Some(error),
            RelocateOutcome::Failed(error) => Some(error),
        }
    }
}

/// What to do when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFileError {
    /// Log the failure and continue with the next file
    Skip,
    /// Halt the whole run
    Abort,
}

impl fmt::Display for OnFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnFileError::Skip => write!(f, "skip"),
            OnFileError::Abort => write!(f, "abort"),
        }
    }
}

/// Knobs of a relocation run.
#[derive(Debug, Clone)]
pub struct RelocateOptions {
    /// Failure policy for uploads
    pub upload_on_error: OnFileError,

    /// Failure policy for downloads
    pub download_on_error: OnFileError,

    /// Abort once this many files fail in a row (None = never)
    pub max_consecutive_failures: Option<u32>,

    /// Re-read the destination and compare checksums before deleting the source
    pub verify: Option<ChecksumAlgorithm>,

    /// Copy the source modification time onto the destination
    pub preserve_mtime: bool,
}

impl RelocateOptions {
    pub fn policy_for(&self, direction: TransferDirection) -> OnFileError {
        match direction {
            TransferDirection::Upload => self.upload_on_error,
            TransferDirection::Download => self.download_on_error,
        }
    }
}

impl Default for RelocateOptions {
    fn default() -> Self {
        RelocateOptions {
            upload_on_error: OnFileError::Skip,
            download_on_error: OnFileError::Abort,
            max_consecutive_failures: None,
            verify: None,
            preserve_mtime: true,
        }
    }
}

/// A validated run: direction, ordered folders and options.
#[derive(Debug, Clone)]
pub struct RelocationPlan {
    pub direction: TransferDirection,
    pub folders: Vec<String>,
    pub options: RelocateOptions,
}

/// Counters for one processed folder.
#[derive(Debug, Clone, Default)]
pub struct FolderReport {
    pub folder: String,
    pub relocated: usize,
    pub kept: usize,
    pub failed: usize,
    pub skipped_dirs: usize,
    pub bytes: u64,
    /// (file name, error message) for every failed or kept file
    pub problems: Vec<(String, String)>,
}

impl FolderReport {
    pub fn new(folder: &str) -> Self {
        FolderReport {
            folder: folder.to_string(),
            ..Default::default()
        }
    }

    /// Fold one file's outcome into the counters.
    pub fn record(&mut self, name: &str, outcome: &RelocateOutcome) {
        match outcome {
            RelocateOutcome::Relocated { bytes } => {
                self.relocated += 1;
                self.bytes += bytes;
            }
            RelocateOutcome::SourceKept { bytes, error } => {
                self.kept += 1;
                self.bytes += bytes;
                self.problems.push((name.to_string(), error.to_string()));
            }
            RelocateOutcome::Failed(error) => {
                self.failed += 1;
                self.problems.push((name.to_string(), error.to_string()));
            }
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub id: Uuid,
    pub direction: TransferDirection,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub folders: Vec<FolderReport>,
}

impl RunReport {
    pub fn new(direction: TransferDirection) -> Self {
        RunReport {
            id: Uuid::new_v4(),
            direction,
            started_at: Utc::now(),
            finished_at: None,
            folders: Vec::new(),
        }
    }

    pub fn relocated(&self) -> usize {
        self.folders.iter().map(|f| f.relocated).sum()
    }

    pub fn kept(&self) -> usize {
        self.folders.iter().map(|f| f.kept).sum()
    }

    pub fn failed(&self) -> usize {
        self.folders.iter().map(|f| f.failed).sum()
    }

    pub fn bytes(&self) -> u64 {
        self.folders.iter().map(|f| f.bytes).sum()
    }
}
