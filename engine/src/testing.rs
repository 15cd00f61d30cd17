//! Test doubles: a `Share` that injects failures and an observer that records calls.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::model::{FileEntry, FolderReport, RelocateOutcome, RelocatePath, RunReport, TransferDirection};
use crate::progress::RelocateObserver;
use crate::share::{FsShare, Share, ShareWriter};

fn injected(kind: io::ErrorKind, what: &str) -> io::Error {
    io::Error::new(kind, format!("injected failure: {}", what))
}

/// An `FsShare` with switchable faults.
pub struct FaultyShare {
    inner: FsShare,
    fail_list: bool,
    fail_ensure_dir_on_call: Option<usize>,
    ensure_calls: Cell<usize>,
    fail_open: HashSet<PathBuf>,
    fail_create: HashSet<PathBuf>,
    fail_write_after: HashMap<PathBuf, usize>,
    fail_remove: HashSet<PathBuf>,
    fail_finish: HashSet<PathBuf>,
    corrupt_writes: HashSet<PathBuf>,
}

impl FaultyShare {
    pub fn new(root: &Path) -> Self {
        FaultyShare {
            inner: FsShare::local(root),
            fail_list: false,
            fail_ensure_dir_on_call: None,
            ensure_calls: Cell::new(0),
            fail_open: HashSet::new(),
            fail_create: HashSet::new(),
            fail_write_after: HashMap::new(),
            fail_remove: HashSet::new(),
            fail_finish: HashSet::new(),
            corrupt_writes: HashSet::new(),
        }
    }

    /// Every listing fails as if the share were unreachable.
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// The n-th `ensure_dir` call (1-based) fails with permission denied.
    pub fn failing_ensure_dir_on_call(mut self, call: usize) -> Self {
        self.fail_ensure_dir_on_call = Some(call);
        self
    }

    pub fn failing_open(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_open.insert(path.into());
        self
    }

    pub fn failing_create(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_create.insert(path.into());
        self
    }

    /// Writes to `path` break after `limit` bytes, like a dropped connection.
    pub fn failing_write_after(mut self, path: impl Into<PathBuf>, limit: usize) -> Self {
        self.fail_write_after.insert(path.into(), limit);
        self
    }

    pub fn failing_remove(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_remove.insert(path.into());
        self
    }

    /// Every write to `path` succeeds but closing it fails, like a network
    /// mount reporting a lost write on close.
    pub fn failing_finish(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_finish.insert(path.into());
        self
    }

    /// Bytes written to `path` land with their first byte flipped.
    pub fn corrupting_write(mut self, path: impl Into<PathBuf>) -> Self {
        self.corrupt_writes.insert(path.into());
        self
    }
}

impl Share for FaultyShare {
    fn name(&self) -> &str {
        "faulty"
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>> {
        if self.fail_list {
            return Err(injected(io::ErrorKind::NotConnected, "list"));
        }
        self.inner.list_dir(path)
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        let call = self.ensure_calls.get() + 1;
        self.ensure_calls.set(call);
        if self.fail_ensure_dir_on_call == Some(call) {
            return Err(injected(io::ErrorKind::PermissionDenied, "mkdir"));
        }
        self.inner.ensure_dir(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        if self.fail_open.contains(path) {
            return Err(injected(io::ErrorKind::PermissionDenied, "open"));
        }
        self.inner.open_read(path)
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn ShareWriter + '_>> {
        if self.fail_create.contains(path) {
            return Err(injected(io::ErrorKind::PermissionDenied, "create"));
        }
        let writer = self.inner.create_write(path)?;
        if self.fail_finish.contains(path) {
            return Ok(Box::new(UnclosableWriter { inner: writer }));
        }
        if self.corrupt_writes.contains(path) {
            return Ok(Box::new(CorruptingWriter { inner: writer }));
        }
        match self.fail_write_after.get(path) {
            Some(&limit) => Ok(Box::new(BrokenWriter {
                inner: writer,
                limit,
                written: 0,
            })),
            None => Ok(writer),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove.contains(path) {
            return Err(injected(io::ErrorKind::PermissionDenied, "remove"));
        }
        self.inner.remove_file(path)
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        self.inner.set_modified(path, modified)
    }
}

/// Passes `limit` bytes through, then fails every write.
struct BrokenWriter<'a> {
    inner: Box<dyn ShareWriter + 'a>,
    limit: usize,
    written: usize,
}

impl Write for BrokenWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.limit {
            return Err(injected(io::ErrorKind::ConnectionReset, "write"));
        }
        let allowed = buf.len().min(self.limit - self.written);
        let n = self.inner.write(&buf[..allowed])?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ShareWriter for BrokenWriter<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.inner.finish()
    }
}

struct CorruptingWriter<'a> {
    inner: Box<dyn ShareWriter + 'a>,
}

impl Write for CorruptingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = buf.to_vec();
        if let Some(first) = data.first_mut() {
            *first ^= 0xff;
        }
        self.inner.write_all(&data)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ShareWriter for CorruptingWriter<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.inner.finish()
    }
}

/// Writes land, then the close reports an I/O error.
struct UnclosableWriter<'a> {
    inner: Box<dyn ShareWriter + 'a>,
}

impl Write for UnclosableWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ShareWriter for UnclosableWriter<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        self.inner.finish()?;
        Err(injected(io::ErrorKind::Other, "close"))
    }
}

/// Records observer calls as strings, in order.
pub struct RecordingObserver {
    calls: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        RecordingObserver {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the `on_file_completed` records, e.g. `done(reports/a.txt)`.
    pub fn completed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("done(") || c.starts_with("kept(") || c.starts_with("failed("))
            .collect()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RelocateObserver for RecordingObserver {
    fn on_run_started(&self, direction: TransferDirection, folders: &[String]) {
        self.push(format!("run({}, {})", direction, folders.join(",")));
    }

    fn on_folder_started(&self, folder: &str) {
        self.push(format!("folder({})", folder));
    }

    fn on_file_started(&self, path: &RelocatePath) {
        self.push(format!("file({})", path.local.display()));
    }

    fn on_file_progress(&self, _path: &RelocatePath, _bytes_copied: u64) {}

    fn on_file_completed(&self, path: &RelocatePath, outcome: &RelocateOutcome) {
        let tag = match outcome {
            RelocateOutcome::Relocated { .. } => "done",
            RelocateOutcome::SourceKept { .. } => "kept",
            RelocateOutcome::Failed(_) => "failed",
        };
        self.push(format!("{}({})", tag, path.local.display()));
    }

    fn on_folder_completed(&self, report: &FolderReport) {
        self.push(format!("folder_done({})", report.folder));
    }

    fn on_run_completed(&self, _report: &RunReport) {
        self.push("run_done".to_string());
    }
}
