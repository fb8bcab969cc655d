//! Disambiguated destination names.
//!
//! When `report.pdf` is taken, candidates are `report_001.pdf`,
//! `report_002.pdf`, ... The counter is zero-padded to at least three digits
//! and keeps growing past 999 (`report_1000.pdf`).

use std::ffi::{OsStr, OsString};
use std::path::Path;

use crate::error::SyncError;
use crate::fs_ops::FileSystem;

/// Minimum width of the numeric suffix.
const COUNTER_WIDTH: usize = 3;

/// Build the candidate name for `counter`.
///
/// The extension is whatever follows the last `.` of the name, except that a
/// leading dot does not start an extension (`.bashrc` has none).
pub fn numbered_name(desired: &OsStr, counter: u64) -> OsString {
    let path = Path::new(desired);
    let stem = path.file_stem().unwrap_or(desired);

    let mut name = stem.to_os_string();
    name.push(format!("_{:0width$}", counter, width = COUNTER_WIDTH));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Return `desired` if it is free in `dir`, otherwise the first free
/// numbered variant.
///
/// The check is not atomic: another writer may take the name before the copy
/// happens. The copy itself refuses to overwrite, so such a race ends up as a
/// `WriteError` for that file.
///
/// # Errors
/// `ReadError` if probing the directory fails, `NameResolutionExhausted` if
/// the counter overflows.
pub fn resolve_name<F: FileSystem + ?Sized>(
    fs: &F,
    dir: &Path,
    desired: &OsStr,
) -> Result<OsString, SyncError> {
    if !is_taken(fs, dir, desired)? {
        return Ok(desired.to_os_string());
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = numbered_name(desired, counter);
        if !is_taken(fs, dir, &candidate)? {
            return Ok(candidate);
        }
        counter = counter
            .checked_add(1)
            .ok_or_else(|| SyncError::NameResolutionExhausted {
                dir: dir.to_path_buf(),
                name: desired.to_string_lossy().into_owned(),
            })?;
    }
}

fn is_taken<F: FileSystem + ?Sized>(fs: &F, dir: &Path, name: &OsStr) -> Result<bool, SyncError> {
    let path = dir.join(name);
    fs.exists(&path)
        .map_err(|e| SyncError::ReadError { path, source: e })
}
