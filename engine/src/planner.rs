//! Per-file decision: copy, copy under a new name, or skip.

use std::ffi::OsString;
use std::path::Path;

use crate::checksums::{compute_file_checksum, ChecksumAlgorithm};
use crate::error::SyncError;
use crate::fs_ops::FileSystem;
use crate::resolver::resolve_name;

/// What to do with one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// The name is free in the destination
    CopyAs(OsString),
    /// A different file owns the name; copy under this disambiguated one
    RenameCopyAs(OsString),
    /// The destination already holds identical content under the same name
    Skip,
}

/// Decide the action for `source_file` against `dest_dir`.
///
/// # Errors
/// Fingerprinting failures on either side are returned as `ReadError`;
/// they are never read as "different".
pub fn plan_file<F: FileSystem + ?Sized>(
    fs: &F,
    source_file: &Path,
    dest_dir: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<SyncAction, SyncError> {
    let name = source_file.file_name().ok_or_else(|| SyncError::ReadError {
        path: source_file.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let existing = dest_dir.join(name);

    let taken = fs.exists(&existing).map_err(|e| SyncError::ReadError {
        path: existing.clone(),
        source: e,
    })?;
    if !taken {
        return Ok(SyncAction::CopyAs(name.to_os_string()));
    }

    // A directory holding the name has no content to compare against
    if fs.is_dir(&existing) {
        let resolved = resolve_name(fs, dest_dir, name)?;
        tracing::debug!(
            "{} is a directory, copying as {}",
            existing.display(),
            resolved.to_string_lossy()
        );
        return Ok(SyncAction::RenameCopyAs(resolved));
    }

    let source_sum = compute_file_checksum(fs, source_file, algorithm)?;
    let dest_sum = compute_file_checksum(fs, &existing, algorithm)?;

    if source_sum == dest_sum {
        tracing::debug!(
            "{} unchanged ({})",
            existing.display(),
            source_sum.to_string_with_algo()
        );
        return Ok(SyncAction::Skip);
    }

    let resolved = resolve_name(fs, dest_dir, name)?;
    tracing::debug!(
        "{} differs ({} vs {}), copying as {}",
        existing.display(),
        source_sum,
        dest_sum,
        resolved.to_string_lossy()
    );
    Ok(SyncAction::RenameCopyAs(resolved))
}
