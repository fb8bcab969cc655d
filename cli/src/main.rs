//! FolderSync - Command-line front-end for the sync engine.
//!
//! Syncs either the stored list of folder pairs or a one-off pair, and edits
//! the stored list. The engine runs on a worker thread; this thread renders
//! the progress and log events it sends back.

mod logging;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::unbounded;
use engine::{
    ChannelObserver, ChecksumAlgorithm, FolderPair, LocalFs, PairStatus, PairStore, RunSummary,
    SyncEvent, SyncJob, SyncLog, SyncLogEntry, SyncOptions,
};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

/// FolderSync - one-way folder sync that never overwrites or deletes
#[derive(Parser, Debug)]
#[command(name = "foldersync")]
#[command(version)]
#[command(about = "Copy new and changed files from source folders into destination folders")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync every stored folder pair, in order
    Run {
        /// Pair list file (defaults to the user configuration directory)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Sync a single pair given on the command line
    Sync {
        /// Source directory
        #[arg(long, value_name = "PATH")]
        src: PathBuf,

        /// Destination directory (created if missing)
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Show or edit the stored folder pairs
    Pairs {
        /// Pair list file (defaults to the user configuration directory)
        #[arg(long, value_name = "PATH", global = true)]
        config: Option<PathBuf>,

        #[command(subcommand)]
        action: PairsAction,
    },
}

#[derive(Subcommand, Debug)]
enum PairsAction {
    /// List stored pairs with their index
    List,
    /// Append a pair
    Add {
        #[arg(long, value_name = "PATH")]
        src: PathBuf,
        #[arg(long, value_name = "PATH")]
        dst: PathBuf,
    },
    /// Remove the pair at INDEX
    Remove { index: usize },
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    /// Content comparison algorithm: crc32, md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", default_value = "crc32")]
    hash: String,

    /// Do not copy modification times to new files
    #[arg(long)]
    no_preserve_mtime: bool,

    /// Write the sync log as JSON to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl SyncArgs {
    fn options(&self) -> Result<SyncOptions, String> {
        let checksum_algorithm: ChecksumAlgorithm = self.hash.parse()?;
        Ok(SyncOptions {
            checksum_algorithm,
            preserve_modified_time: !self.no_preserve_mtime,
        })
    }
}

/// Renders engine events on stderr
struct CliProgress {
    verbose: bool,
    labels: Vec<String>,
    bar_open: bool,
}

impl CliProgress {
    fn new(verbose: bool, pairs: &[FolderPair]) -> Self {
        let labels = pairs
            .iter()
            .map(|p| format!("{} -> {}", p.source.display(), p.destination.display()))
            .collect();
        CliProgress {
            verbose,
            labels,
            bar_open: false,
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn end_bar(&mut self) {
        if self.bar_open {
            eprintln!();
            self.bar_open = false;
        }
    }

    fn handle(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Progress { pair_index, progress } => {
                let label = self
                    .labels
                    .get(*pair_index)
                    .cloned()
                    .unwrap_or_else(|| "(unknown pair)".to_string());
                match progress.status {
                    PairStatus::Pending => {}
                    PairStatus::Syncing => {
                        if progress.current == 0 {
                            self.end_bar();
                            eprintln!("[{}] {}", pair_index + 1, label);
                        }
                        let percent = (progress.fraction() * 100.0) as u32;
                        eprint!(
                            "\r  {} {}/{} files",
                            Self::print_progress_bar(percent),
                            progress.current,
                            progress.total
                        );
                        let _ = std::io::stderr().flush();
                        self.bar_open = true;
                    }
                    PairStatus::Completed => {
                        eprint!(
                            "\r  {} {}/{} files",
                            Self::print_progress_bar(100),
                            progress.current,
                            progress.total
                        );
                        self.bar_open = true;
                        self.end_bar();
                    }
                    PairStatus::Error => {
                        self.end_bar();
                        eprintln!("[{}] {}: failed", pair_index + 1, label);
                    }
                }
            }
            SyncEvent::Log { entry, .. } => {
                if self.verbose || entry.is_error() {
                    self.end_bar();
                    eprintln!("  {}", entry);
                }
            }
        }
    }
}

/// Counts shown after a run
#[derive(Debug, Default, PartialEq, Eq)]
struct LogCounts {
    copied: usize,
    renamed: usize,
    errors: usize,
}

impl LogCounts {
    fn from_log(log: &SyncLog) -> Self {
        let mut counts = LogCounts::default();
        for entry in log.entries() {
            match entry {
                SyncLogEntry::Copied { .. } => counts.copied += 1,
                SyncLogEntry::Renamed { .. } => counts.renamed += 1,
                SyncLogEntry::Errored { .. } => counts.errors += 1,
            }
        }
        counts
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let exit_code = match run_cli(&cli) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Run { config, sync } => {
            let store = open_store(config.as_ref())?;
            let pairs = store.load().map_err(|e| e.to_string())?;
            if pairs.is_empty() {
                return Err(format!(
                    "No folder pairs configured in {}. Add one with 'foldersync pairs add'",
                    store.path().display()
                ));
            }
            sync_pairs(pairs, sync, cli.verbose)
        }
        Command::Sync { src, dst, sync } => {
            sync_pairs(vec![FolderPair::new(src, dst)], sync, cli.verbose)
        }
        Command::Pairs { config, action } => {
            let store = open_store(config.as_ref())?;
            edit_pairs(&store, action)
        }
    }
}

fn open_store(config: Option<&PathBuf>) -> Result<PairStore, String> {
    match config {
        Some(path) => Ok(PairStore::new(path)),
        None => PairStore::default_location().map_err(|e| e.to_string()),
    }
}

fn edit_pairs(store: &PairStore, action: &PairsAction) -> Result<(), String> {
    match action {
        PairsAction::List => {
            let pairs = store.load().map_err(|e| e.to_string())?;
            if pairs.is_empty() {
                println!("No folder pairs configured ({})", store.path().display());
            }
            for (index, pair) in pairs.iter().enumerate() {
                println!(
                    "{:3}  {} -> {}",
                    index,
                    pair.source.display(),
                    pair.destination.display()
                );
            }
            Ok(())
        }
        PairsAction::Add { src, dst } => {
            let index = store
                .add(FolderPair::new(src, dst))
                .map_err(|e| e.to_string())?;
            println!("Added pair {}: {} -> {}", index, src.display(), dst.display());
            Ok(())
        }
        PairsAction::Remove { index } => {
            let removed = store.remove(*index).map_err(|e| e.to_string())?;
            println!(
                "Removed pair {}: {} -> {}",
                index,
                removed.source.display(),
                removed.destination.display()
            );
            Ok(())
        }
    }
}

/// Run the engine on a worker thread and render its events here.
fn sync_pairs(pairs: Vec<FolderPair>, args: &SyncArgs, verbose: bool) -> Result<(), String> {
    let options = args.options()?;
    let start_time = Instant::now();
    let mut progress = CliProgress::new(verbose, &pairs);

    let (tx, rx) = unbounded::<SyncEvent>();
    let worker = thread::spawn(move || {
        let mut pairs = pairs;
        let mut job = SyncJob::new(LocalFs, options);
        let observer = ChannelObserver::new(tx);
        let summary = job.run(&mut pairs, Some(&observer));
        (summary, job.log().clone())
    });

    // Ends once the worker drops its sender
    for event in rx.iter() {
        progress.handle(&event);
    }
    progress.end_bar();

    let (summary, log): (RunSummary, SyncLog) = worker
        .join()
        .map_err(|_| "Sync worker thread panicked".to_string())?;

    if let Some(path) = &args.log_file {
        log.write_json(path).map_err(|e| e.to_string())?;
        eprintln!("Log written to {}", path.display());
    }

    let counts = LogCounts::from_log(&log);
    eprintln!();
    eprintln!(
        "Summary: {} copied, {} renamed, {} errors ({} of {} pair(s) completed)",
        counts.copied,
        counts.renamed,
        counts.errors,
        summary.completed_pairs(),
        summary.results.len()
    );
    eprintln!("Elapsed: {}", CliProgress::format_duration(start_time.elapsed()));

    if counts.errors > 0 {
        Err("One or more files or pairs failed to sync".to_string())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sync_args() -> SyncArgs {
        SyncArgs {
            hash: "crc32".to_string(),
            no_preserve_mtime: false,
            log_file: None,
        }
    }

    fn cli(command: Command) -> Cli {
        Cli {
            command,
            verbose: false,
        }
    }

    #[test]
    fn test_sync_with_valid_directories() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let result = run_cli(&cli(Command::Sync {
            src: src_dir.path().to_path_buf(),
            dst: dst_dir.path().to_path_buf(),
            sync: sync_args(),
        }));

        assert!(result.is_ok(), "CLI should succeed with valid directories");
        let copied = std::fs::read_to_string(dst_dir.path().join("test.txt")).expect("read");
        assert_eq!(copied, "hello");
    }

    #[test]
    fn test_sync_writes_log_file() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let log_path = dst_dir.path().join("sync-log.json");
        std::fs::write(src_dir.path().join("a.txt"), "hello").expect("Failed to write file");
        std::fs::write(dst_dir.path().join("a.txt"), "world").expect("Failed to write file");

        let mut args = sync_args();
        args.hash = "blake3".to_string();
        args.log_file = Some(log_path.clone());
        run_cli(&cli(Command::Sync {
            src: src_dir.path().to_path_buf(),
            dst: dst_dir.path().to_path_buf(),
            sync: args,
        }))
        .expect("sync should succeed");

        let log = std::fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("\"newName\": \"a_001.txt\""));
    }

    #[test]
    fn test_sync_missing_source_reports_failure() {
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let result = run_cli(&cli(Command::Sync {
            src: PathBuf::from("/nonexistent/path"),
            dst: dst_dir.path().join("out"),
            sync: sync_args(),
        }));

        assert!(result.is_err(), "A failed pair should give a failing exit");
        assert!(!dst_dir.path().join("out").exists());
    }

    #[test]
    fn test_rejects_invalid_hash_algorithm() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let mut args = sync_args();
        args.hash = "invalid_algo".to_string();
        let result = run_cli(&cli(Command::Sync {
            src: src_dir.path().to_path_buf(),
            dst: dst_dir.path().to_path_buf(),
            sync: args,
        }));

        assert!(result.is_err(), "CLI should reject invalid hash algorithm");
    }

    #[test]
    fn test_pairs_add_then_run() {
        let config_dir = TempDir::new().expect("Failed to create temp dir");
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config_dir.path().join("pairs.json");
        std::fs::write(src_dir.path().join("a.txt"), "a").expect("Failed to write file");

        run_cli(&cli(Command::Pairs {
            config: Some(config.clone()),
            action: PairsAction::Add {
                src: src_dir.path().to_path_buf(),
                dst: dst_dir.path().to_path_buf(),
            },
        }))
        .expect("add should succeed");

        run_cli(&cli(Command::Run {
            config: Some(config.clone()),
            sync: sync_args(),
        }))
        .expect("run should succeed");
        assert!(dst_dir.path().join("a.txt").exists());

        run_cli(&cli(Command::Pairs {
            config: Some(config.clone()),
            action: PairsAction::Remove { index: 0 },
        }))
        .expect("remove should succeed");
        assert!(PairStore::new(&config).load().expect("load").is_empty());
    }

    #[test]
    fn test_run_without_pairs_fails() {
        let config_dir = TempDir::new().expect("Failed to create temp dir");

        let result = run_cli(&cli(Command::Run {
            config: Some(config_dir.path().join("pairs.json")),
            sync: sync_args(),
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_progress_bar_rendering() {
        assert_eq!(CliProgress::print_progress_bar(0), format!("[{}]   0%", " ".repeat(20)));
        assert_eq!(CliProgress::print_progress_bar(100), format!("[{}] 100%", "=".repeat(20)));
    }

    #[test]
    fn test_log_counts() {
        let mut log = SyncLog::new();
        let stamp = log.next_timestamp();
        log.push(SyncLogEntry::Copied {
            name: "a".to_string(),
            source: PathBuf::from("/s/a"),
            destination: PathBuf::from("/d/a"),
            timestamp: stamp,
        });
        log.push(SyncLogEntry::Errored {
            source: PathBuf::from("/s/b"),
            destination: None,
            error: "denied".to_string(),
            timestamp: stamp,
        });

        assert_eq!(
            LogCounts::from_log(&log),
            LogCounts {
                copied: 1,
                renamed: 0,
                errors: 1
            }
        );
    }
}
