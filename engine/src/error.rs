//! Error types for the sync engine.
//!
//! `SyncError` covers both pair-scoped failures (the destination cannot be
//! established, the source cannot be listed) and file-scoped failures
//! (a single file cannot be read, fingerprinted or written). Which scope an
//! error belongs to is decided by where it is caught, see `pair.rs`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while synchronizing folder pairs.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source file unreadable, or fingerprinting it failed
    #[error("Failed to read file: {}", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Copy failed on the destination side (unwritable, disk full, name taken)
    #[error("Failed to write file: {}", path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Directory enumeration failed
    #[error("Failed to list directory: {}", path.display())]
    ListError { path: PathBuf, source: io::Error },

    /// Destination directory could not be established
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreateError { path: PathBuf, source: io::Error },

    /// No free disambiguated name could be found
    #[error("No free name for '{}' in {}", name, dir.display())]
    NameResolutionExhausted { dir: PathBuf, name: String },

    /// The run was cancelled before this pair finished
    #[error("Sync cancelled")]
    Cancelled,

    /// The stored folder-pair configuration could not be loaded or saved
    #[error("Configuration error: {} ({})", path.display(), reason)]
    ConfigError { path: PathBuf, reason: String },
}

impl SyncError {
    /// True for errors that stop the whole pair rather than one file.
    pub fn is_pair_fatal(&self) -> bool {
        matches!(
            self,
            Self::ListError { .. } | Self::DirectoryCreateError { .. } | Self::Cancelled
        )
    }

    /// Message used for `Errored` log entries: the error plus its io cause.
    pub fn detailed_message(&self) -> String {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::ListError { source, .. }
            | Self::DirectoryCreateError { source, .. } => format!("{}: {}", self, source),
            _ => self.to_string(),
        }
    }
}
