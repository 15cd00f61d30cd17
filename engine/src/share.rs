//! Access to the two trees a run touches.
//!
//! The engine only talks to a `Share`. `FsShare` is the shipped implementation:
//! a directory tree reachable through the operating system, either the local
//! working tree or a network share the OS already mounted (a mount point, or a
//! `\\host\share` UNC root on Windows). All paths handed to a share are
//! relative to its root.

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::ShareConfig;
use crate::error::EngineError;
use crate::model::FileEntry;

/// A destination handle opened by `Share::create_write`.
///
/// Dropping a writer discards close errors; `finish` reports them.
pub trait ShareWriter: Write {
    /// Flush, persist and close the handle.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Operations the relocation engine needs from either side.
///
/// Handles returned by `open_read` are closed when dropped; writers are closed
/// with `ShareWriter::finish`.
pub trait Share {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Non-recursive listing, sorted by name.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>>;

    /// Create `path` and any missing parents; succeeds if it already exists.
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Create a file, truncating any existing one.
    fn create_write(&self, path: &Path) -> io::Result<Box<dyn ShareWriter + '_>>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Best effort; shares that cannot store times may ignore the call.
    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()>;
}

/// A `Share` backed by `std::fs` under a root directory.
#[derive(Debug, Clone)]
pub struct FsShare {
    root: PathBuf,
    name: String,
}

impl FsShare {
    /// The local tree, rooted at `root` (usually the working directory).
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = format!("local:{}", root.display());
        FsShare { root, name }
    }

    /// Open the remote share described by the configuration.
    ///
    /// The root must already be reachable; mounting and authentication are
    /// done by the operating system's SMB client.
    pub fn connect(config: &ShareConfig) -> Result<Self, EngineError> {
        let root = config.root().map_err(|reason| EngineError::Connection {
            root: PathBuf::from(&config.share),
            source: io::Error::new(io::ErrorKind::InvalidInput, reason),
        })?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            root = %root.display(),
            "Connecting to share"
        );

        match fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(EngineError::Connection {
                    root,
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "share root exists but is not a directory",
                    ),
                })
            }
            Err(e) => return Err(EngineError::Connection { root, source: e }),
        }

        let name = format!("smb://{}:{}/{}", config.host, config.port, config.share);
        Ok(FsShare { root, name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

impl Share for FsShare {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(FileEntry {
                name: entry.file_name(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified: metadata.modified().ok(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        let full = self.resolve(path);
        match fs::metadata(&full) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists but is not a directory", full.display()),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&full),
            Err(e) => Err(e),
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let file = fs::File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn ShareWriter + '_>> {
        let file = fs::File::create(self.resolve(path))?;
        Ok(Box::new(FsWriter {
            inner: BufWriter::new(file),
        }))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(self.resolve(path), filetime::FileTime::from_system_time(modified))
    }
}

struct FsWriter {
    inner: BufWriter<fs::File>,
}

impl Write for FsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ShareWriter for FsWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}
