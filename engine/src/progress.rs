//! Observer trait for relocation runs.
//!
//! The engine reports every step to an optional `RelocateObserver`, which keeps
//! the engine independent of how outcomes are shown or captured (CLI summary,
//! test recorder). The persistent log is written separately through `tracing`.
//!
//! All methods are called synchronously, in run order, on the engine's thread.

use crate::model::{FolderReport, RelocateOutcome, RelocatePath, RunReport, TransferDirection};

pub trait RelocateObserver: Send {
    /// Called once before the first folder.
    fn on_run_started(&self, direction: TransferDirection, folders: &[String]);

    /// Called before a folder is listed.
    fn on_folder_started(&self, folder: &str);

    /// Called when a file leaves the `Listed` state.
    fn on_file_started(&self, path: &RelocatePath);

    /// Called after each copied chunk with the running byte count for the file.
    fn on_file_progress(&self, path: &RelocatePath, bytes_copied: u64);

    /// Called once per file with its final outcome.
    fn on_file_completed(&self, path: &RelocatePath, outcome: &RelocateOutcome);

    /// Called after every file of a folder was processed.
    fn on_folder_completed(&self, report: &FolderReport);

    /// Called when all folders ran to completion (not on fatal errors).
    fn on_run_completed(&self, report: &RunReport);
}
