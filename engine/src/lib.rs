//! # Relocation engine
//!
//! Moves files between a local tree and a remote network share in one
//! direction per run. Upload copies local files to the same relative path on
//! the share and deletes the local originals; download does the reverse.
//!
//! ## Overview
//!
//! - Top-level files of each configured folder are relocated one at a time,
//!   folders in configuration order
//! - Each file walks a small state machine (ensure directory, open, create,
//!   copy, optional verify, delete source); the source is only deleted after a
//!   complete copy
//! - Per-file failures are skipped or abort the run, per direction
//! - Outcomes are reported through an injectable `RelocateObserver` and logged
//!   through `tracing`
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{create_plan, run_plan, FsShare, RelocateOptions, TransferDirection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let local = FsShare::local(".");
//! let remote = FsShare::local("/mnt/exchange");
//!
//! let plan = create_plan(
//!     TransferDirection::Upload,
//!     vec!["reports".to_string()],
//!     RelocateOptions::default(),
//! )?;
//!
//! let report = run_plan(&plan, &local, &remote, None)?;
//! println!("{} relocated, {} failed", report.relocated(), report.failed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (directions, paths, states, reports)
//! - **error**: Run-level, file-level and configuration errors
//! - **share**: The `Share` trait and the filesystem-backed implementation
//! - **fs_ops**: Path mirroring, folder listing, streaming copy
//! - **job**: Plan creation, folder and file relocation
//! - **progress**: Observer trait
//! - **checksums**: Verify-after-copy hashing
//! - **config**: YAML configuration

pub mod checksums;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod progress;
pub mod share;

#[cfg(test)]
mod testing;

// Re-export main types and functions
pub use checksums::{ChecksumAlgorithm, ChecksumValue};
pub use config::{LogConfig, PolicyConfig, RelocationConfig, ShareConfig};
pub use error::{ConfigError, EngineError, FileError};
pub use fs_ops::mirror_path;
pub use job::{create_plan, relocate_file, relocate_folder, run_plan};
pub use model::{
    FileEntry, FileState, FolderReport, OnFileError, RelocateOptions, RelocateOutcome,
    RelocatePath, RelocationPlan, RunReport, Side, TransferDirection,
};
pub use progress::RelocateObserver;
pub use share::{FsShare, Share, ShareWriter};
