//! Low-level operations shared by both directions:
//! - Mirroring a folder/file name onto both trees
//! - Listing the files of a folder
//! - Streaming bytes from a source handle to a destination handle

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::checksums::StreamHasher;
use crate::model::{FileEntry, RelocatePath};
use crate::share::Share;

/// Chunk size for streaming copies and checksum reads.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Build the path of `file_name` inside `folder`, identical on both trees.
///
/// No normalisation is applied: `..` and symlinks are passed through as given.
/// The file name is joined byte for byte, so names that are not valid UTF-8
/// still resolve to the listed file.
pub fn mirror_path(folder: &str, file_name: impl AsRef<OsStr>) -> RelocatePath {
    let relative = Path::new(folder).join(file_name.as_ref());
    RelocatePath {
        local: relative.clone(),
        remote: relative,
    }
}

/// List the top-level entries of `folder` on `share`.
///
/// Directories are returned too (flagged); callers decide to skip them.
pub fn list_folder(share: &dyn Share, folder: &str) -> io::Result<Vec<FileEntry>> {
    share.list_dir(Path::new(folder))
}

/// Copy everything from `reader` into `writer` and flush it.
///
/// Flushing does not close the handle; share writers still need `finish`.
///
/// Each chunk is fed to `hasher` when present, and `on_progress` receives the
/// running byte count. Returns the number of bytes copied.
pub fn copy_stream<W: Write + ?Sized>(
    reader: &mut dyn Read,
    writer: &mut W,
    mut hasher: Option<&mut StreamHasher>,
    mut on_progress: impl FnMut(u64),
) -> io::Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer[..n])?;
        if let Some(hasher) = hasher.as_deref_mut() {
            hasher.update(&buffer[..n]);
        }

        copied += n as u64;
        on_progress(copied);
    }

    writer.flush()?;
    Ok(copied)
}
