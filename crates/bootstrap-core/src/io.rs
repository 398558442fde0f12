use crate::error::Result;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically create `path` with `data`, using a tempfile in the same
/// directory. Returns false, leaving the file alone, if `path` already exists
/// when the tempfile is moved into place. An interrupted write never leaves a
/// truncated file behind.
pub fn create_atomic(path: &Path, data: &[u8]) -> Result<bool> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Copy `src` to `dst` byte-for-byte unless `dst` already exists.
/// Returns true if the copy happened.
pub fn copy_if_missing(src: &Path, dst: &Path) -> Result<bool> {
    if dst.exists() {
        return Ok(false);
    }
    let data = std::fs::read(src)?;
    create_atomic(dst, &data)
}
