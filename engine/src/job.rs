//! Relocation orchestration.
//!
//! This module provides the run lifecycle:
//! - Creating a plan from a direction and an ordered folder list
//! - Relocating one folder (list, then relocate every top-level file)
//! - Relocating one file through the per-file state machine
//! - Running a whole plan, folder after folder
//!
//! Everything is sequential: one folder at a time, one file at a time.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::checksums::{compute_checksum, ChecksumValue, StreamHasher};
use crate::error::{EngineError, FileError};
use crate::fs_ops;
use crate::model::{
    FileEntry, FileState, FolderReport, OnFileError, RelocateOptions, RelocateOutcome,
    RelocatePath, RelocationPlan, RunReport, TransferDirection,
};
use crate::progress::RelocateObserver;
use crate::share::Share;

/// Counts per-file failures in a row across the whole run.
struct FailureStreak {
    count: u32,
    limit: Option<u32>,
}

impl FailureStreak {
    fn new(limit: Option<u32>) -> Self {
        FailureStreak { count: 0, limit }
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    /// Returns true once the limit is reached.
    fn fail(&mut self) -> bool {
        self.count += 1;
        matches!(self.limit, Some(limit) if self.count >= limit)
    }
}

/// Create a validated relocation plan.
///
/// # Errors
/// Returns `EngineError::InvalidPlan` for an empty folder list, a blank folder
/// name, or a zero failure limit.
pub fn create_plan(
    direction: TransferDirection,
    folders: Vec<String>,
    options: RelocateOptions,
) -> Result<RelocationPlan, EngineError> {
    if folders.is_empty() {
        return Err(EngineError::InvalidPlan {
            reason: "no folders to relocate".to_string(),
        });
    }
    if folders.iter().any(|f| f.trim().is_empty()) {
        return Err(EngineError::InvalidPlan {
            reason: "folder names must not be blank".to_string(),
        });
    }
    if options.max_consecutive_failures == Some(0) {
        return Err(EngineError::InvalidPlan {
            reason: "max_consecutive_failures must be at least 1".to_string(),
        });
    }

    Ok(RelocationPlan {
        direction,
        folders,
        options,
    })
}

/// Run a plan: relocate every folder, in order.
///
/// Per-file failures are handled according to the direction's policy; the
/// first fatal error stops the run and is returned. Folders after it are not
/// touched.
pub fn run_plan(
    plan: &RelocationPlan,
    local: &dyn Share,
    remote: &dyn Share,
    observer: Option<&dyn RelocateObserver>,
) -> Result<RunReport, EngineError> {
    if plan.folders.is_empty() {
        return Err(EngineError::InvalidPlan {
            reason: "no folders to relocate".to_string(),
        });
    }

    let mut report = RunReport::new(plan.direction);
    tracing::info!(
        run_id = %report.id,
        direction = %plan.direction,
        folders = plan.folders.len(),
        local = local.name(),
        remote = remote.name(),
        "Relocation started"
    );

    if let Some(callback) = observer {
        callback.on_run_started(plan.direction, &plan.folders);
    }

    let mut streak = FailureStreak::new(plan.options.max_consecutive_failures);
    for folder in &plan.folders {
        match process_folder(
            plan.direction,
            folder,
            local,
            remote,
            &plan.options,
            observer,
            &mut streak,
        ) {
            Ok(folder_report) => report.folders.push(folder_report),
            Err(e) => {
                tracing::error!(run_id = %report.id, folder = %folder, "Relocation halted: {}", e);
                return Err(e);
            }
        }
    }

    report.finished_at = Some(Utc::now());
    tracing::info!(
        run_id = %report.id,
        relocated = report.relocated(),
        kept = report.kept(),
        failed = report.failed(),
        bytes = report.bytes(),
        "Relocation finished"
    );

    if let Some(callback) = observer {
        callback.on_run_completed(&report);
    }

    Ok(report)
}

/// Relocate the top-level files of one folder.
///
/// Upload reads `folder` on `local` and writes the mirrored path on `remote`;
/// download does the reverse. Subdirectories are skipped, never recursed into.
///
/// # Errors
/// Listing failures are always fatal. Per-file failures become fatal when the
/// direction's policy is `Abort` or the consecutive-failure limit is reached.
pub fn relocate_folder(
    direction: TransferDirection,
    folder: &str,
    local: &dyn Share,
    remote: &dyn Share,
    options: &RelocateOptions,
    observer: Option<&dyn RelocateObserver>,
) -> Result<FolderReport, EngineError> {
    let mut streak = FailureStreak::new(options.max_consecutive_failures);
    process_folder(direction, folder, local, remote, options, observer, &mut streak)
}

fn process_folder(
    direction: TransferDirection,
    folder: &str,
    local: &dyn Share,
    remote: &dyn Share,
    options: &RelocateOptions,
    observer: Option<&dyn RelocateObserver>,
    streak: &mut FailureStreak,
) -> Result<FolderReport, EngineError> {
    let (source, destination) = match direction {
        TransferDirection::Upload => (local, remote),
        TransferDirection::Download => (remote, local),
    };

    match direction {
        TransferDirection::Upload => tracing::info!("Uploading files in folder: {}", folder),
        TransferDirection::Download => tracing::info!("Downloading files in folder: {}", folder),
    }

    if let Some(callback) = observer {
        callback.on_folder_started(folder);
    }

    let entries = fs_ops::list_folder(source, folder).map_err(|e| EngineError::Listing {
        side: direction.source_side(),
        path: PathBuf::from(folder),
        source: e,
    })?;

    let policy = options.policy_for(direction);
    let mut report = FolderReport::new(folder);

    for entry in &entries {
        let name = entry.name.to_string_lossy();
        if entry.is_dir {
            tracing::debug!(folder, name = %name, "Skipping directory");
            report.skipped_dirs += 1;
            continue;
        }

        let path = fs_ops::mirror_path(folder, &entry.name);
        tracing::debug!(folder, name = %name, size = entry.size, "Relocating file");
        if let Some(callback) = observer {
            callback.on_file_started(&path);
        }

        let outcome = relocate_file(direction, entry, &path, source, destination, options, observer);
        log_outcome(direction, &name, &outcome);
        report.record(&name, &outcome);

        if let Some(callback) = observer {
            callback.on_file_completed(&path, &outcome);
        }

        match outcome {
            RelocateOutcome::Relocated { .. } => streak.reset(),
            RelocateOutcome::SourceKept { error, .. } => {
                if policy == OnFileError::Abort {
                    return Err(EngineError::FileAborted {
                        direction,
                        source: error,
                    });
                }
                streak.reset();
            }
            RelocateOutcome::Failed(error) => {
                if policy == OnFileError::Abort {
                    return Err(EngineError::FileAborted {
                        direction,
                        source: error,
                    });
                }
                if streak.fail() {
                    return Err(EngineError::TooManyFailures {
                        count: streak.count,
                        last: error,
                    });
                }
            }
        }
    }

    tracing::info!(
        folder,
        relocated = report.relocated,
        kept = report.kept,
        failed = report.failed,
        skipped_dirs = report.skipped_dirs,
        "Folder done"
    );

    if let Some(callback) = observer {
        callback.on_folder_completed(&report);
    }

    Ok(report)
}

fn log_outcome(direction: TransferDirection, name: &str, outcome: &RelocateOutcome) {
    match (outcome, direction) {
        (RelocateOutcome::Relocated { .. }, TransferDirection::Upload) => {
            tracing::info!("Uploaded and removed local file: {}", name);
        }
        (RelocateOutcome::Relocated { .. }, TransferDirection::Download) => {
            tracing::info!("Downloaded and removed remote file: {}", name);
        }
        (RelocateOutcome::SourceKept { error, .. }, _) => {
            tracing::warn!(
                "Copied {} but could not remove the {} original: {}",
                name,
                direction.source_side(),
                error
            );
        }
        (RelocateOutcome::Failed(error), _) => {
            tracing::warn!("{}", error);
        }
    }
}

/// Relocate one file: copy it to the destination, then delete the source.
///
/// The source is only deleted after the copy (and verification, when enabled)
/// fully succeeded. Both handles are closed before deletion.
pub fn relocate_file(
    direction: TransferDirection,
    entry: &FileEntry,
    path: &RelocatePath,
    source: &dyn Share,
    destination: &dyn Share,
    options: &RelocateOptions,
    observer: Option<&dyn RelocateObserver>,
) -> RelocateOutcome {
    let bytes = match copy_file(direction, entry, path, source, destination, options, observer) {
        Ok(bytes) => bytes,
        Err(error) => return RelocateOutcome::Failed(error),
    };

    let source_path = path.source(direction);
    match source.remove_file(source_path) {
        Ok(()) => {
            tracing::debug!(path = %source_path.display(), "{:?}", FileState::SourceDeleted);
            RelocateOutcome::Relocated { bytes }
        }
        Err(e) => RelocateOutcome::SourceKept {
            bytes,
            error: FileError::new(FileState::SourceDeleted, source_path, e),
        },
    }
}

/// Walk the states up to `Copied` (and `Verified`), returning the byte count.
fn copy_file(
    direction: TransferDirection,
    entry: &FileEntry,
    path: &RelocatePath,
    source: &dyn Share,
    destination: &dyn Share,
    options: &RelocateOptions,
    observer: Option<&dyn RelocateObserver>,
) -> Result<u64, FileError> {
    let source_path = path.source(direction);
    let destination_path = path.destination(direction);

    if let Some(parent) = destination_path.parent() {
        if !parent.as_os_str().is_empty() {
            destination
                .ensure_dir(parent)
                .map_err(|e| FileError::new(FileState::DirEnsured, parent, e))?;
        }
    }
    tracing::debug!(path = %destination_path.display(), "{:?}", FileState::DirEnsured);

    let mut reader = source
        .open_read(source_path)
        .map_err(|e| FileError::new(FileState::SourceOpened, source_path, e))?;
    tracing::debug!(path = %source_path.display(), "{:?}", FileState::SourceOpened);

    let mut writer = destination
        .create_write(destination_path)
        .map_err(|e| FileError::new(FileState::DestCreated, destination_path, e))?;
    tracing::debug!(path = %destination_path.display(), "{:?}", FileState::DestCreated);

    let mut hasher = options.verify.map(StreamHasher::new);
    let bytes = fs_ops::copy_stream(&mut *reader, &mut *writer, hasher.as_mut(), |copied| {
        if let Some(callback) = observer {
            callback.on_file_progress(path, copied);
        }
    })
    .map_err(|e| FileError::new(FileState::Copied, destination_path, e))?;

    // Network mounts may only report a failed write on close
    writer
        .finish()
        .map_err(|e| FileError::new(FileState::Copied, destination_path, e))?;
    drop(reader);
    tracing::debug!(path = %destination_path.display(), bytes, "{:?}", FileState::Copied);

    if options.preserve_mtime {
        if let Some(modified) = entry.modified {
            if let Err(e) = destination.set_modified(destination_path, modified) {
                tracing::debug!(path = %destination_path.display(), "Could not preserve mtime: {}", e);
            }
        }
    }

    if let Some(hasher) = hasher {
        verify_destination(destination, destination_path, hasher.finalize())?;
        tracing::debug!(path = %destination_path.display(), "{:?}", FileState::Verified);
    }

    Ok(bytes)
}

/// Re-read the destination and compare it with the checksum of the streamed source.
fn verify_destination(
    destination: &dyn Share,
    destination_path: &Path,
    expected: ChecksumValue,
) -> Result<(), FileError> {
    let mut reader = destination
        .open_read(destination_path)
        .map_err(|e| FileError::new(FileState::Verified, destination_path, e))?;
    let actual = compute_checksum(&mut *reader, expected.algorithm())
        .map_err(|e| FileError::new(FileState::Verified, destination_path, e))?;

    if actual != expected {
        return Err(FileError::new(
            FileState::Verified,
            destination_path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch: source {} destination {}", expected, actual),
            ),
        ));
    }
    Ok(())
}
