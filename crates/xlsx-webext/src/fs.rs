//! Filesystem helpers for reading and replacing parts of an extracted package.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::WebExtError;

/// Read a part, treating a missing file as `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, WebExtError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replace a part on disk via a sibling temp file, so a failed write leaves the old part intact.
pub(crate) fn replace_part(path: &Path, bytes: &[u8]) -> Result<(), WebExtError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
