//! Run orchestration.
//!
//! A `SyncJob` walks the configured pairs strictly in order, one at a time,
//! hands each to a `PairSyncer`, and owns the log of the current run:
//! - the log is cleared when a run starts, or on request
//! - a failed pair never stops the run; the next pair is processed
//! - cancellation is cooperative, checked between files and between pairs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::fs_ops::FileSystem;
use crate::log::SyncLog;
use crate::model::{FolderPair, PairResult, ProgressState, SyncOptions};
use crate::pair::PairSyncer;
use crate::progress::SyncObserver;

/// Shared flag used to stop a run early.
///
/// Clone it before handing the job to a worker thread and call `cancel()`
/// from anywhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What happened to each pair in a run, by configured position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// `None` for pairs never started because the run was cancelled
    pub results: Vec<Option<PairResult>>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn completed_pairs(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.as_ref().map_or(false, PairResult::is_completed))
            .count()
    }

    pub fn failed_pairs(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, Some(PairResult::Failed(_))))
            .count()
    }
}

/// Syncs an ordered list of folder pairs against one filesystem provider.
pub struct SyncJob<F: FileSystem> {
    fs: F,
    options: SyncOptions,
    log: SyncLog,
    cancel: CancelToken,
}

impl<F: FileSystem> SyncJob<F> {
    pub fn new(fs: F, options: SyncOptions) -> Self {
        SyncJob {
            fs,
            options,
            log: SyncLog::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Token that stops this job's current or next run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Log of the last run.
    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Run every pair in order.
    ///
    /// Each pair's `progress` is reset to pending, then updated as the run
    /// proceeds; the same updates are sent to `observer`, tagged with the
    /// pair's index.
    pub fn run(
        &mut self,
        pairs: &mut [FolderPair],
        observer: Option<&dyn SyncObserver>,
    ) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id);
        let _guard = span.enter();

        self.log.clear();
        info!("starting sync of {} pair(s)", pairs.len());

        for (index, pair) in pairs.iter_mut().enumerate() {
            let pending = ProgressState::pending();
            pair.progress = Some(pending);
            if let Some(observer) = observer {
                observer.on_progress(index, &pending);
            }
        }

        let mut results = Vec::with_capacity(pairs.len());
        for (index, pair) in pairs.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            let result = PairSyncer::new(
                &self.fs,
                self.options,
                &mut self.log,
                observer,
                &self.cancel,
            )
            .sync(index, pair);
            results.push(Some(result));
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            warn!("sync cancelled after {} of {} pair(s)", results.len(), pairs.len());
        }
        results.resize(pairs.len(), None);

        let summary = RunSummary {
            run_id,
            results,
            cancelled,
        };
        info!(
            "sync finished: {} pair(s) completed, {} failed, {} log entries ({} errors)",
            summary.completed_pairs(),
            summary.failed_pairs(),
            self.log.len(),
            self.log.error_count()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::{LocalFs, MemoryFs};
    use crate::log::SyncLogEntry;
    use crate::model::PairStatus;
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestObserver {
        calls: Mutex<Vec<String>>,
        progress: Mutex<Vec<(usize, ProgressState)>>,
    }

    impl TestObserver {
        fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn progress_for(&self, pair_index: usize) -> Vec<ProgressState> {
            self.progress
                .lock()
                .unwrap()
                .iter()
                .filter(|(i, _)| *i == pair_index)
                .map(|(_, p)| *p)
                .collect()
        }
    }

    impl SyncObserver for TestObserver {
        fn on_progress(&self, pair_index: usize, progress: &ProgressState) {
            self.calls.lock().unwrap().push(format!(
                "progress({}, {}/{} {})",
                pair_index, progress.current, progress.total, progress.status
            ));
            self.progress.lock().unwrap().push((pair_index, *progress));
        }

        fn on_log_entry(&self, pair_index: usize, entry: &SyncLogEntry) {
            let kind = match entry {
                SyncLogEntry::Copied { .. } => "copied",
                SyncLogEntry::Renamed { .. } => "renamed",
                SyncLogEntry::Errored { .. } => "error",
            };
            self.calls.lock().unwrap().push(format!("log({}, {})", pair_index, kind));
        }
    }

    struct Dirs {
        _temp: tempfile::TempDir,
        src: std::path::PathBuf,
        dst: std::path::PathBuf,
    }

    fn dirs() -> Dirs {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src dir");
        Dirs { _temp: temp, src, dst }
    }

    fn run_local(pairs: &mut [FolderPair]) -> (SyncJob<LocalFs>, RunSummary, TestObserver) {
        let observer = TestObserver::default();
        let mut job = SyncJob::new(LocalFs, SyncOptions::default());
        let summary = job.run(pairs, Some(&observer));
        (job, summary, observer)
    }

    #[test]
    fn test_new_file_is_copied() {
        let d = dirs();
        fs::write(d.src.join("a.txt"), "hello").expect("Failed to write file");

        let mut pairs = vec![FolderPair::new(&d.src, &d.dst)];
        let (job, summary, observer) = run_local(&mut pairs);

        assert_eq!(summary.results, vec![Some(PairResult::Completed)]);
        assert_eq!(fs::read_to_string(d.dst.join("a.txt")).expect("read"), "hello");
        assert_eq!(job.log().len(), 1);
        assert!(matches!(
            &job.log().entries()[0],
            SyncLogEntry::Copied { name, .. } if name == "a.txt"
        ));
        assert_eq!(observer.progress_for(0).last(), Some(&ProgressState::completed(1)));
        assert_eq!(pairs[0].progress, Some(ProgressState::completed(1)));
    }

    #[test]
    fn test_identical_file_is_skipped_silently() {
        let d = dirs();
        fs::write(d.src.join("a.txt"), "hello").expect("Failed to write file");
        fs::create_dir(&d.dst).expect("Failed to create dst dir");
        fs::write(d.dst.join("a.txt"), "hello").expect("Failed to write file");

        let mut pairs = vec![FolderPair::new(&d.src, &d.dst)];
        let (job, _, observer) = run_local(&mut pairs);

        assert!(job.log().is_empty());
        assert_eq!(observer.progress_for(0).last(), Some(&ProgressState::completed(1)));
        let mut names: Vec<_> = fs::read_dir(&d.dst)
            .expect("list")
            .map(|e| e.expect("entry").file_name())
            .collect();
        names.sort();
        assert_eq!(names, vec![std::ffi::OsString::from("a.txt")]);
    }

    #[test]
    fn test_different_file_is_copied_under_new_name() {
        let d = dirs();
        fs::write(d.src.join("a.txt"), "hello").expect("Failed to write file");
        fs::create_dir(&d.dst).expect("Failed to create dst dir");
        fs::write(d.dst.join("a.txt"), "world").expect("Failed to write file");

        let mut pairs = vec![FolderPair::new(&d.src, &d.dst)];
        let (job, _, _) = run_local(&mut pairs);

        // Pre-existing file untouched
        assert_eq!(fs::read_to_string(d.dst.join("a.txt")).expect("read"), "world");
        assert_eq!(fs::read_to_string(d.dst.join("a_001.txt")).expect("read"), "hello");
        assert_eq!(job.log().len(), 1);
        match &job.log().entries()[0] {
            SyncLogEntry::Renamed { original_name, new_name, .. } => {
                assert_eq!(original_name, "a.txt");
                assert_eq!(new_name, "a_001.txt");
            }
            other => panic!("expected Renamed, got {:?}", other),
        }
    }

    #[test]
    fn test_next_free_suffix_is_used() {
        let d = dirs();
        fs::write(d.src.join("a.txt"), "hello").expect("Failed to write file");
        fs::create_dir(&d.dst).expect("Failed to create dst dir");
        fs::write(d.dst.join("a.txt"), "world").expect("Failed to write file");
        fs::write(d.dst.join("a_001.txt"), "older").expect("Failed to write file");

        let mut pairs = vec![FolderPair::new(&d.src, &d.dst)];
        let (job, _, _) = run_local(&mut pairs);

        assert_eq!(fs::read_to_string(d.dst.join("a_002.txt")).expect("read"), "hello");
        assert_eq!(fs::read_to_string(d.dst.join("a_001.txt")).expect("read"), "older");
        assert!(matches!(
            &job.log().entries()[0],
            SyncLogEntry::Renamed { new_name, .. } if new_name == "a_002.txt"
        ));
    }

    #[test]
    fn test_failed_pair_does_not_stop_the_run() {
        let mem = MemoryFs::new();
        mem.add_file("/bad/a.txt", b"a");
        mem.fail_listing("/bad");
        mem.add_file("/good/b.txt", b"b");

        let mut pairs = vec![
            FolderPair::new("/bad", "/out1"),
            FolderPair::new("/good", "/out2"),
        ];
        let observer = TestObserver::default();
        let mut job = SyncJob::new(mem, SyncOptions::default());
        let summary = job.run(&mut pairs, Some(&observer));

        assert!(matches!(summary.results[0], Some(PairResult::Failed(_))));
        assert_eq!(summary.results[1], Some(PairResult::Completed));
        assert_eq!(observer.progress_for(0).last(), Some(&ProgressState::error(0, 0)));
        assert_eq!(pairs[1].progress, Some(ProgressState::completed(1)));
        assert_eq!(job.filesystem().read("/out2/b.txt").as_deref(), Some(&b"b"[..]));

        let entries = job.log().entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_error());
        assert!(matches!(entries[1], SyncLogEntry::Copied { .. }));
    }

    #[test]
    fn test_events_follow_configured_order() {
        let mem = MemoryFs::new();
        mem.add_file("/one/a.txt", b"a");
        mem.add_file("/two/b.txt", b"b");

        let mut pairs = vec![
            FolderPair::new("/one", "/dst1"),
            FolderPair::new("/two", "/dst2"),
        ];
        let observer = TestObserver::default();
        let mut job = SyncJob::new(mem, SyncOptions::default());
        job.run(&mut pairs, Some(&observer));

        assert_eq!(
            observer.get_calls(),
            vec![
                "progress(0, 0/0 pending)",
                "progress(1, 0/0 pending)",
                "progress(0, 0/1 syncing)",
                "log(0, copied)",
                "progress(0, 1/1 syncing)",
                "progress(0, 1/1 completed)",
                "progress(1, 0/1 syncing)",
                "log(1, copied)",
                "progress(1, 1/1 syncing)",
                "progress(1, 1/1 completed)",
            ]
        );
    }

    #[test]
    fn test_log_is_cleared_between_runs() {
        let mem = MemoryFs::new();
        mem.add_file("/src/a.txt", b"a");
        let mut pairs = vec![FolderPair::new("/src", "/dst")];
        let mut job = SyncJob::new(mem, SyncOptions::default());

        job.run(&mut pairs, None);
        assert_eq!(job.log().len(), 1);

        // Second run finds identical content and logs nothing
        job.run(&mut pairs, None);
        assert!(job.log().is_empty());

        job.filesystem().add_file("/src/b.txt", b"b");
        job.run(&mut pairs, None);
        assert_eq!(job.log().len(), 1);
        job.clear_log();
        assert!(job.log().is_empty());
    }

    #[test]
    fn test_run_never_alters_existing_destination_files() {
        let mem = MemoryFs::new();
        mem.add_file("/src/a.txt", b"new a");
        mem.add_file("/src/b.txt", b"same");
        mem.add_file("/src/c.txt", b"c");
        mem.add_file("/dst/a.txt", b"old a");
        mem.add_file("/dst/b.txt", b"same");
        mem.add_file("/dst/a_001.txt", b"older a");

        let mut pairs = vec![FolderPair::new("/src", "/dst")];
        let mut job = SyncJob::new(mem, SyncOptions::default());
        job.run(&mut pairs, None);

        let fs = job.filesystem();
        assert_eq!(fs.read("/dst/a.txt").as_deref(), Some(&b"old a"[..]));
        assert_eq!(fs.read("/dst/a_001.txt").as_deref(), Some(&b"older a"[..]));
        assert_eq!(fs.read("/dst/b.txt").as_deref(), Some(&b"same"[..]));
        assert_eq!(fs.read("/dst/a_002.txt").as_deref(), Some(&b"new a"[..]));
        assert_eq!(fs.read("/dst/c.txt").as_deref(), Some(&b"c"[..]));
    }

    #[test]
    fn test_cancelled_run_leaves_remaining_pairs_pending() {
        let mem = MemoryFs::new();
        mem.add_file("/one/a.txt", b"a");
        mem.add_file("/two/b.txt", b"b");
        let mut pairs = vec![
            FolderPair::new("/one", "/dst1"),
            FolderPair::new("/two", "/dst2"),
        ];

        let mut job = SyncJob::new(mem, SyncOptions::default());
        job.cancel_token().cancel();
        let summary = job.run(&mut pairs, None);

        assert!(summary.cancelled);
        assert_eq!(summary.results, vec![None, None]);
        assert_eq!(pairs[0].progress.map(|p| p.status), Some(PairStatus::Pending));
        assert!(job.log().is_empty());
    }
}
