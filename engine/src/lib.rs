//! # FolderSync Engine - One-way Folder Sync Library
//!
//! A headless engine that copies the files of source folders into
//! destination folders without ever overwriting or deleting anything.
//! Designed as the foundation for multiple front-ends (CLI, GUI, automation).
//!
//! ## Overview
//!
//! For every configured (source, destination) pair, each file directly inside
//! the source is handled as follows:
//! - not present in the destination: copied
//! - present with identical content: skipped
//! - present with different content: copied as `name_001.ext`, `name_002.ext`, ...
//!
//! Pairs are processed one after another. Per-file failures are recorded in
//! the run's log and never stop the pair; a pair that cannot be listed or
//! whose destination cannot be created is marked as failed and the run moves
//! on to the next pair.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{FolderPair, LocalFs, SyncJob, SyncOptions};
//!
//! let mut pairs = vec![FolderPair::new("/photos", "/backup/photos")];
//! let mut job = SyncJob::new(LocalFs, SyncOptions::default());
//! let summary = job.run(&mut pairs, None);
//!
//! println!("{} pair(s) completed", summary.completed_pairs());
//! for entry in job.log().entries() {
//!     println!("{}", entry);
//! }
//! ```
//!
//! ## Modules
//!
//! - **model**: FolderPair, ProgressState, PairResult, SyncOptions
//! - **error**: Error types and handling
//! - **checksums**: Content fingerprints
//! - **fs_ops**: Filesystem provider trait, local and in-memory providers
//! - **resolver**: Disambiguated destination names
//! - **planner**: Per-file copy / rename / skip decision
//! - **pair**: Syncing one folder pair
//! - **job**: Running a list of pairs
//! - **log**: The per-run sync log
//! - **progress**: Observer trait and channel sink
//! - **config**: Stored folder-pair list

pub mod checksums;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod log;
pub mod model;
pub mod pair;
pub mod planner;
pub mod progress;
pub mod resolver;

// Re-export main types and functions
pub use checksums::{compute_file_checksum, fingerprint_bytes, ChecksumAlgorithm, ChecksumValue};
pub use config::PairStore;
pub use error::SyncError;
pub use fs_ops::{FileSystem, LocalFs, MemoryFs};
pub use job::{CancelToken, RunSummary, SyncJob};
pub use log::{SyncLog, SyncLogEntry};
pub use model::{FolderPair, PairResult, PairStatus, ProgressState, SyncOptions};
pub use pair::PairSyncer;
pub use planner::{plan_file, SyncAction};
pub use progress::{ChannelObserver, SyncEvent, SyncObserver};
pub use resolver::resolve_name;
