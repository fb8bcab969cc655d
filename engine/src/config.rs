//! Folder-pair configuration storage.
//!
//! Pairs are stored as JSON:
//!
//! ```json
//! { "pairs": [ { "source": "/photos", "destination": "/backup/photos" } ] }
//! ```
//!
//! Progress is never persisted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::model::FolderPair;

const APP_DIR: &str = "foldersync";
const PAIRS_FILE: &str = "pairs.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPairs {
    #[serde(default)]
    pairs: Vec<FolderPair>,
}

/// Load/save of the configured pair list at a fixed path.
#[derive(Debug, Clone)]
pub struct PairStore {
    path: PathBuf,
}

impl PairStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PairStore { path: path.into() }
    }

    /// Store at `<config dir>/foldersync/pairs.json`.
    pub fn default_location() -> Result<Self, SyncError> {
        let base = dirs::config_dir().ok_or_else(|| SyncError::ConfigError {
            path: PathBuf::from(PAIRS_FILE),
            reason: "no configuration directory on this platform".to_string(),
        })?;
        Ok(Self::new(base.join(APP_DIR).join(PAIRS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn config_error(&self, reason: impl ToString) -> SyncError {
        SyncError::ConfigError {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    /// Load the stored pairs. A missing file means no pairs yet.
    pub fn load(&self) -> Result<Vec<FolderPair>, SyncError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.config_error(e)),
        };
        let stored: StoredPairs =
            serde_json::from_str(&content).map_err(|e| self.config_error(e))?;
        Ok(stored.pairs)
    }

    /// Replace the stored pairs, creating the parent directory if needed.
    pub fn save(&self, pairs: &[FolderPair]) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.config_error(e))?;
            }
        }
        let stored = StoredPairs {
            pairs: pairs.to_vec(),
        };
        let content = serde_json::to_string_pretty(&stored).map_err(|e| self.config_error(e))?;
        fs::write(&self.path, content).map_err(|e| self.config_error(e))?;
        tracing::debug!("saved {} pair(s) to {}", pairs.len(), self.path.display());
        Ok(())
    }

    /// Append a pair and save. Returns its index.
    pub fn add(&self, pair: FolderPair) -> Result<usize, SyncError> {
        let mut pairs = self.load()?;
        pairs.push(pair);
        self.save(&pairs)?;
        Ok(pairs.len() - 1)
    }

    /// Remove the pair at `index` and save. Returns the removed pair.
    pub fn remove(&self, index: usize) -> Result<FolderPair, SyncError> {
        let mut pairs = self.load()?;
        if index >= pairs.len() {
            return Err(self.config_error(format!(
                "no pair at index {} ({} configured)",
                index,
                pairs.len()
            )));
        }
        let removed = pairs.remove(index);
        self.save(&pairs)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressState;

    #[test]
    fn test_missing_file_loads_empty() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = PairStore::new(temp_dir.path().join("pairs.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_order_and_drops_progress() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = PairStore::new(temp_dir.path().join("nested").join("pairs.json"));

        let mut first = FolderPair::new("/a", "/b");
        first.progress = Some(ProgressState::completed(2));
        let second = FolderPair::new("/c", "/d");
        store.save(&[first, second]).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, vec![FolderPair::new("/a", "/b"), FolderPair::new("/c", "/d")]);
    }

    #[test]
    fn test_add_and_remove() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = PairStore::new(temp_dir.path().join("pairs.json"));

        assert_eq!(store.add(FolderPair::new("/a", "/b")).expect("add"), 0);
        assert_eq!(store.add(FolderPair::new("/c", "/d")).expect("add"), 1);

        let removed = store.remove(0).expect("remove");
        assert_eq!(removed.source, PathBuf::from("/a"));
        assert_eq!(store.load().expect("load"), vec![FolderPair::new("/c", "/d")]);

        assert!(matches!(store.remove(5), Err(SyncError::ConfigError { .. })));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("pairs.json");
        fs::write(&path, "{ not json").expect("Failed to write file");

        let result = PairStore::new(&path).load();
        assert!(matches!(result, Err(SyncError::ConfigError { .. })));
    }
}
