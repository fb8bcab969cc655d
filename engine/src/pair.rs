//! Syncing a single folder pair.
//!
//! Failure scope is decided here:
//! - the source cannot be listed or the destination cannot be established:
//!   the whole pair fails, with one `Errored` entry and status `Error`
//! - anything that goes wrong with one file: that file gets an `Errored`
//!   entry and the loop moves on

use std::ffi::OsString;
use std::io;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::fs_ops::{self, FileSystem};
use crate::job::CancelToken;
use crate::log::{SyncLog, SyncLogEntry};
use crate::model::{FolderPair, PairResult, ProgressState, SyncOptions};
use crate::planner::{plan_file, SyncAction};
use crate::progress::SyncObserver;

/// Drives the transfer of one pair, writing into a run's log.
pub struct PairSyncer<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    options: SyncOptions,
    log: &'a mut SyncLog,
    observer: Option<&'a dyn SyncObserver>,
    cancel: &'a CancelToken,
}

#[derive(Debug, Default)]
struct PairCounts {
    copied: usize,
    renamed: usize,
    skipped: usize,
    failed: usize,
}

impl<'a, F: FileSystem + ?Sized> PairSyncer<'a, F> {
    pub fn new(
        fs: &'a F,
        options: SyncOptions,
        log: &'a mut SyncLog,
        observer: Option<&'a dyn SyncObserver>,
        cancel: &'a CancelToken,
    ) -> Self {
        PairSyncer {
            fs,
            options,
            log,
            observer,
            cancel,
        }
    }

    /// Sync every direct child file of `pair.source` into `pair.destination`.
    ///
    /// Returns `Completed` once all files were visited, even if some of them
    /// failed; those failures are in the log.
    pub fn sync(&mut self, pair_index: usize, pair: &mut FolderPair) -> PairResult {
        info!(
            "pair {}: {} -> {}",
            pair_index,
            pair.source.display(),
            pair.destination.display()
        );

        let files = match self.prepare(pair) {
            Ok(files) => files,
            Err(e) => return self.fail_pair(pair_index, pair, 0, 0, e),
        };
        let total = files.len();
        self.set_progress(pair_index, pair, ProgressState::syncing(0, total));

        let mut counts = PairCounts::default();
        for (i, name) in files.iter().enumerate() {
            let src = pair.source.join(name);
            let outcome = if self.cancel.is_cancelled() {
                Err(SyncError::Cancelled)
            } else {
                self.sync_file(&src, &pair.destination)
            };

            match outcome {
                Err(e) if e.is_pair_fatal() => {
                    return self.fail_pair(pair_index, pair, i, total, e);
                }
                Ok(Some(entry)) => {
                    match entry {
                        SyncLogEntry::Renamed { .. } => counts.renamed += 1,
                        _ => counts.copied += 1,
                    }
                    self.record(pair_index, entry);
                }
                Ok(None) => counts.skipped += 1,
                Err(e) => {
                    warn!("{}: {}", src.display(), e.detailed_message());
                    counts.failed += 1;
                    let entry = SyncLogEntry::Errored {
                        source: src,
                        destination: Some(pair.destination.clone()),
                        error: e.detailed_message(),
                        timestamp: self.log.next_timestamp(),
                    };
                    self.record(pair_index, entry);
                }
            }

            self.set_progress(pair_index, pair, ProgressState::syncing(i + 1, total));
        }

        self.set_progress(pair_index, pair, ProgressState::completed(total));
        info!(
            "pair {} completed: {} copied, {} renamed, {} skipped, {} failed",
            pair_index, counts.copied, counts.renamed, counts.skipped, counts.failed
        );
        PairResult::Completed
    }

    /// Check the source, establish the destination and list the files.
    fn prepare(&self, pair: &FolderPair) -> Result<Vec<OsString>, SyncError> {
        if !self.fs.is_dir(&pair.source) {
            let list_error = |e| SyncError::ListError {
                path: pair.source.clone(),
                source: e,
            };
            let reason = if self.fs.exists(&pair.source).map_err(list_error)? {
                io::Error::new(io::ErrorKind::InvalidInput, "source is not a directory")
            } else {
                io::Error::new(io::ErrorKind::NotFound, "source directory does not exist")
            };
            return Err(list_error(reason));
        }

        fs_ops::ensure_dir(self.fs, &pair.destination)?;

        self.fs
            .list_files(&pair.source)
            .map_err(|e| SyncError::ListError {
                path: pair.source.clone(),
                source: e,
            })
    }

    /// Plan and execute one file. `Ok(None)` means skipped.
    fn sync_file(
        &mut self,
        src: &Path,
        dest_dir: &Path,
    ) -> Result<Option<SyncLogEntry>, SyncError> {
        let action = plan_file(self.fs, src, dest_dir, self.options.checksum_algorithm)?;

        let (target_name, renamed) = match action {
            SyncAction::Skip => {
                debug!("skip {}", src.display());
                return Ok(None);
            }
            SyncAction::CopyAs(name) => (name, false),
            SyncAction::RenameCopyAs(name) => (name, true),
        };

        let destination = dest_dir.join(&target_name);
        let bytes = fs_ops::copy_file(
            self.fs,
            src,
            &destination,
            self.options.preserve_modified_time,
        )?;
        debug!("{} -> {} ({} bytes)", src.display(), destination.display(), bytes);

        let original_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let timestamp = self.log.next_timestamp();

        let entry = if renamed {
            SyncLogEntry::Renamed {
                original_name,
                new_name: target_name.to_string_lossy().into_owned(),
                source: src.to_path_buf(),
                destination,
                timestamp,
            }
        } else {
            SyncLogEntry::Copied {
                name: original_name,
                source: src.to_path_buf(),
                destination,
                timestamp,
            }
        };
        Ok(Some(entry))
    }

    fn fail_pair(
        &mut self,
        pair_index: usize,
        pair: &mut FolderPair,
        current: usize,
        total: usize,
        err: SyncError,
    ) -> PairResult {
        let message = err.detailed_message();
        error!("pair {} failed: {}", pair_index, message);

        let entry = SyncLogEntry::Errored {
            source: pair.source.clone(),
            destination: Some(pair.destination.clone()),
            error: message.clone(),
            timestamp: self.log.next_timestamp(),
        };
        self.record(pair_index, entry);
        self.set_progress(pair_index, pair, ProgressState::error(current, total));

        PairResult::Failed(message)
    }

    fn record(&mut self, pair_index: usize, entry: SyncLogEntry) {
        if let Some(observer) = self.observer {
            observer.on_log_entry(pair_index, &entry);
        }
        self.log.push(entry);
    }

    fn set_progress(&self, pair_index: usize, pair: &mut FolderPair, progress: ProgressState) {
        debug_assert!(
            pair.progress.map_or(true, |p| p.status <= progress.status),
            "pair status must not move backwards"
        );
        pair.progress = Some(progress);
        if let Some(observer) = self.observer {
            observer.on_progress(pair_index, &progress);
        }
    }
}
