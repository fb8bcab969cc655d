//! Core data model for sync runs.
//!
//! This module defines the main data structures:
//! - FolderPair: one configured (source, destination) association
//! - ProgressState / PairStatus: per-pair progress during a run
//! - PairResult: terminal outcome of one pair
//! - SyncOptions: knobs applied to every pair in a run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::checksums::ChecksumAlgorithm;

/// A configured one-way association from a source folder to a destination folder.
///
/// Identity is the position in the configured list. `progress` is only
/// written by the engine while a run is active and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPair {
    /// Folder whose direct child files are synced
    pub source: PathBuf,

    /// Folder that receives the files
    pub destination: PathBuf,

    /// Progress of the current or last run
    #[serde(skip)]
    pub progress: Option<ProgressState>,
}

impl FolderPair {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        FolderPair {
            source: source.into(),
            destination: destination.into(),
            progress: None,
        }
    }
}

/// Status of a pair within a run. Only moves forward:
/// Pending -> Syncing -> Completed | Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Pending,
    Syncing,
    Completed,
    Error,
}

impl PairStatus {
    /// Returns true if this status is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PairStatus::Completed | PairStatus::Error)
    }
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairStatus::Pending => write!(f, "pending"),
            PairStatus::Syncing => write!(f, "syncing"),
            PairStatus::Completed => write!(f, "completed"),
            PairStatus::Error => write!(f, "error"),
        }
    }
}

/// Progress of one pair: `current` files processed out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub status: PairStatus,
}

impl ProgressState {
    pub fn pending() -> Self {
        ProgressState {
            current: 0,
            total: 0,
            status: PairStatus::Pending,
        }
    }

    pub fn syncing(current: usize, total: usize) -> Self {
        debug_assert!(current <= total);
        ProgressState {
            current,
            total,
            status: PairStatus::Syncing,
        }
    }

    pub fn completed(total: usize) -> Self {
        ProgressState {
            current: total,
            total,
            status: PairStatus::Completed,
        }
    }

    pub fn error(current: usize, total: usize) -> Self {
        debug_assert!(current <= total);
        ProgressState {
            current,
            total,
            status: PairStatus::Error,
        }
    }

    /// Fraction done in `0.0..=1.0`; an empty pair counts as done once terminal.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            if self.status.is_terminal() {
                1.0
            } else {
                0.0
            }
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Outcome of syncing one pair.
///
/// `Completed` means the pair finished iterating its files; individual
/// file failures are only visible through the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairResult {
    Completed,
    Failed(String),
}

impl PairResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, PairResult::Completed)
    }
}

/// Options applied to every pair of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Algorithm used to decide whether two same-named files are identical
    pub checksum_algorithm: ChecksumAlgorithm,

    /// Carry the source modification time over to the copy
    pub preserve_modified_time: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            checksum_algorithm: ChecksumAlgorithm::Crc32,
            preserve_modified_time: true,
        }
    }
}
