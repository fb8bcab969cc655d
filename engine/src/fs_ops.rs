//! Filesystem operations module.
//!
//! The engine never touches `std::fs` directly. Everything goes through the
//! `FileSystem` trait, which has two providers:
//! - `LocalFs`: direct OS file access
//! - `MemoryFs`: an in-memory tree with fault injection, standing in for
//!   sandboxed, handle-based storage
//!
//! On top of the trait this module provides the two compound operations the
//! sync loop needs: establishing a directory and copying a file to a name
//! that must not exist yet.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::SyncError;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Storage the engine syncs from and to.
pub trait FileSystem: Send + Sync {
    /// Whether anything (file or directory) exists at `path`.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and any missing ancestors.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Names of the regular files directly inside `dir`, in listing order.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<OsString>>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>>;

    /// Create a new file for writing. Fails with `AlreadyExists` rather
    /// than truncating an existing file.
    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + '_>>;

    /// Carry the modification time of `src` over to `dst`, where supported.
    fn preserve_modified_time(&self, _src: &Path, _dst: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// Direct OS filesystem access.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let is_file = if file_type.is_symlink() {
                // A link to a file counts as a file; dangling links do not.
                // Any other stat failure keeps the name so the read reports it.
                match fs::metadata(entry.path()) {
                    Ok(meta) => meta.is_file(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                    Err(_) => true,
                }
            } else {
                file_type.is_file()
            };
            if is_file {
                names.push(entry.file_name());
            }
        }
        Ok(names)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn preserve_modified_time(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let mtime = fs::metadata(src)?.modified()?;
        filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
    unreadable: HashSet<PathBuf>,
    unlistable: HashSet<PathBuf>,
    uncreatable: HashSet<PathBuf>,
    unwritable: HashSet<PathBuf>,
}

/// In-memory filesystem.
///
/// Listing order is lexicographic. Faults can be injected per path to
/// simulate permission problems.
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: Mutex<MemoryState>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Poison is ignored: every update leaves the maps consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        insert_dir_chain(&mut state.dirs, path.as_ref());
    }

    /// Add (or replace) a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &[u8]) {
        let path = path.as_ref();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            insert_dir_chain(&mut state.dirs, parent);
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    /// All file paths directly inside `dir`.
    pub fn file_names(&self, dir: impl AsRef<Path>) -> Vec<String> {
        let dir = dir.as_ref();
        self.lock()
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    pub fn fail_reads(&self, path: impl AsRef<Path>) {
        self.lock().unreadable.insert(path.as_ref().to_path_buf());
    }

    pub fn fail_listing(&self, dir: impl AsRef<Path>) {
        self.lock().unlistable.insert(dir.as_ref().to_path_buf());
    }

    pub fn fail_create(&self, dir: impl AsRef<Path>) {
        self.lock().uncreatable.insert(dir.as_ref().to_path_buf());
    }

    /// Make writes to the file at `path` fail, as on a full or read-only volume.
    pub fn fail_writes(&self, path: impl AsRef<Path>) {
        self.lock().unwritable.insert(path.as_ref().to_path_buf());
    }
}

fn insert_dir_chain(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

fn permission_denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("permission denied: {}", path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        let state = self.lock();
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if let Some(blocked) = path.ancestors().find(|a| state.uncreatable.contains(*a)) {
            return Err(permission_denied(blocked));
        }
        if let Some(file) = path.ancestors().find(|a| state.files.contains_key(*a)) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("not a directory: {}", file.display()),
            ));
        }
        insert_dir_chain(&mut state.dirs, path);
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<OsString>> {
        let state = self.lock();
        if state.unlistable.contains(dir) {
            return Err(permission_denied(dir));
        }
        if !state.dirs.contains(dir) {
            return Err(not_found(dir));
        }
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect())
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + '_>> {
        let state = self.lock();
        if state.unreadable.contains(path) {
            return Err(permission_denied(path));
        }
        let data = state.files.get(path).cloned().ok_or_else(|| not_found(path))?;
        Ok(Box::new(io::Cursor::new(data)))
    }

    fn create_new(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        let mut state = self.lock();
        if state.files.contains_key(path) || state.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            ));
        }
        let parent_ok = path.parent().map_or(false, |p| state.dirs.contains(p));
        if !parent_ok {
            return Err(not_found(path));
        }
        state.files.insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            fs: self,
            path: path.to_path_buf(),
        }))
    }
}

/// Appends straight into the owning `MemoryFs`.
struct MemoryWriter<'a> {
    fs: &'a MemoryFs,
    path: PathBuf,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.fs.lock();
        if state.unwritable.contains(&self.path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("no space left on device: {}", self.path.display()),
            ));
        }
        let file = state
            .files
            .get_mut(&self.path)
            .ok_or_else(|| not_found(&self.path))?;
        file.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Make sure `dir` exists as a directory, creating it recursively if absent.
///
/// # Errors
/// Returns `SyncError::DirectoryCreateError` if the path is occupied by a
/// non-directory or cannot be created.
pub fn ensure_dir<F: FileSystem + ?Sized>(fs: &F, dir: &Path) -> Result<(), SyncError> {
    if fs.is_dir(dir) {
        return Ok(());
    }

    let to_error = |e| SyncError::DirectoryCreateError {
        path: dir.to_path_buf(),
        source: e,
    };

    if fs.exists(dir).map_err(to_error)? {
        return Err(to_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Path exists but is not a directory",
        )));
    }

    fs.create_dir_all(dir).map_err(to_error)
}

/// Copy `src` to `dst`, where `dst` must not exist yet.
///
/// Bytes are streamed unchanged. A name taken between resolution and copy
/// surfaces as a `WriteError`; the existing file is never touched.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file<F: FileSystem + ?Sized>(
    fs: &F,
    src: &Path,
    dst: &Path,
    preserve_modified_time: bool,
) -> Result<u64, SyncError> {
    let read_error = |e| SyncError::ReadError {
        path: src.to_path_buf(),
        source: e,
    };
    let write_error = |e| SyncError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    };

    let mut reader = fs.open_read(src).map_err(read_error)?;
    let mut writer = fs.create_new(dst).map_err(write_error)?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        };
        writer.write_all(&buffer[..n]).map_err(write_error)?;
        copied += n as u64;
    }
    writer.flush().map_err(write_error)?;
    drop(writer);

    if preserve_modified_time {
        // Timestamps are cosmetic; the content is already in place.
        if let Err(e) = fs.preserve_modified_time(src, dst) {
            tracing::debug!("could not preserve mtime on {}: {}", dst.display(), e);
        }
    }

    Ok(copied)
}
