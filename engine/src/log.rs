//! The sync log: an ordered, append-only record of what a run did.
//!
//! Skipped files leave no trace here; copies, renamed copies and errors do.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// One auditable action. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncLogEntry {
    Copied {
        name: String,
        source: PathBuf,
        destination: PathBuf,
        timestamp: DateTime<Local>,
    },
    Renamed {
        #[serde(rename = "originalName")]
        original_name: String,
        #[serde(rename = "newName")]
        new_name: String,
        source: PathBuf,
        destination: PathBuf,
        timestamp: DateTime<Local>,
    },
    #[serde(rename = "error")]
    Errored {
        source: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        destination: Option<PathBuf>,
        error: String,
        timestamp: DateTime<Local>,
    },
}

impl SyncLogEntry {
    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            Self::Copied { timestamp, .. }
            | Self::Renamed { timestamp, .. }
            | Self::Errored { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }
}

impl fmt::Display for SyncLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp().format("%Y-%m-%d %H:%M:%S"))?;
        match self {
            Self::Copied { name, source, destination, .. } => write!(
                f,
                "Copied: {} ({} -> {})",
                name,
                source.display(),
                destination.display()
            ),
            Self::Renamed { original_name, new_name, source, destination, .. } => write!(
                f,
                "Renamed: {} -> {} ({} -> {})",
                original_name,
                new_name,
                source.display(),
                destination.display()
            ),
            Self::Errored { source, destination, error, .. } => {
                write!(f, "ERROR: {} (source: {}", error, source.display())?;
                if let Some(dst) = destination {
                    write!(f, ", destination: {}", dst.display())?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Per-run log owned by a `SyncJob`.
#[derive(Debug, Default, Clone)]
pub struct SyncLog {
    entries: Vec<SyncLogEntry>,
    last_stamp: Option<DateTime<Local>>,
}

impl SyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp for the next entry. Never earlier than the previous one,
    /// even if the wall clock steps back.
    pub fn next_timestamp(&mut self) -> DateTime<Local> {
        let now = Local::now();
        let stamp = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    pub fn push(&mut self, entry: SyncLogEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_stamp = None;
    }

    pub fn entries(&self) -> &[SyncLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Export the log as a pretty-printed JSON array.
    pub fn write_json(&self, path: &Path) -> Result<(), SyncError> {
        let write_error = |source: std::io::Error| SyncError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        let json = self.to_json().map_err(|e| write_error(e.into()))?;
        fs::write(path, json).map_err(write_error)
    }
}
