//! Filesystem helpers shared by the disk-backed stores.

use std::fs;
use std::io;
use std::path::Path;

/// Write `contents` to `path` atomically.
///
/// Writes to a temporary file in the same directory, then renames over the
/// target, so readers see either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no parent directory for target file")
    })?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"))?;

    let tmp_path = dir.join(format!("{file_name}.tmp"));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)
}
