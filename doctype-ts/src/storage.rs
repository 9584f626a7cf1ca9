//! Byte storage abstraction.
//!
//! The compiler never touches the file system directly. Everything goes through
//! [`Storage`], a path-keyed byte store with directory listing, so the same code
//! path runs against the real disk ([`FsStorage`]) or an in-memory tree
//! ([`MemoryStorage`]).

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A single entry returned by [`Storage::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path of the entry.
    pub path: PathBuf,

    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Path-keyed byte store with directory listing.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole file. Missing files fail with [`io::ErrorKind::NotFound`].
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// List the direct children of a directory, in storage order.
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Create a directory and all of its missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace the file at `path` with `contents` in one step.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Read a whole file as UTF-8.
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

// =============================================================================
// File system storage
// =============================================================================

/// [`Storage`] backed by the local file system through `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct FsStorage;

impl FsStorage {
    /// Create a new file system storage.
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used while writing `path` atomically.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl Storage for FsStorage {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            let is_dir = if file_type.is_symlink() {
                // A dangling link is an entry, not a missing directory.
                match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata.is_dir(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                    Err(e) => return Err(e),
                }
            } else {
                file_type.is_dir()
            };
            entries.push(DirEntry { path, is_dir });
        }
        Ok(entries)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Operation counters recorded by [`MemoryStorage`].
#[derive(Debug, Default)]
struct Counters {
    reads: AtomicUsize,
    listings: AtomicUsize,
    writes: AtomicUsize,
}

/// Snapshot of the operations performed against a [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Number of `read` calls.
    pub reads: usize,
    /// Number of `list_dir` calls.
    pub listings: usize,
    /// Number of `write_atomic` calls.
    pub writes: usize,
}

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    failing_listings: BTreeMap<PathBuf, io::ErrorKind>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// In-memory [`Storage`] with sorted listing order and operation counters.
///
/// Also records every path read, which makes "loaded at most once" checks easy.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tree: Mutex<Tree>,
    read_log: Mutex<Vec<PathBuf>>,
    counters: Counters,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, creating its parent directories.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        tree.add_parents(&path);
        tree.files.insert(path, contents.into());
    }

    /// Builder form of [`MemoryStorage::insert`].
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Make every later `list_dir` of `path` fail with `kind`.
    pub fn fail_listing(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        let mut tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        tree.failing_listings.insert(path.into(), kind);
    }

    /// Current contents of a file as UTF-8, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        tree.files
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Counters for the operations performed so far.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            listings: self.counters.listings.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    /// Number of times `path` has been read.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let log = self.read_log.lock().unwrap_or_else(|e| e.into_inner());
        log.iter().filter(|p| p.as_path() == path.as_ref()).count()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        self.read_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_path_buf());

        let tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        tree.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.counters.listings.fetch_add(1, Ordering::Relaxed);

        let tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(kind) = tree.failing_listings.get(path) {
            return Err(io::Error::new(*kind, format!("cannot list {}", path.display())));
        }
        if !tree.dirs.contains(path) {
            return Err(not_found(path));
        }

        let mut entries: Vec<DirEntry> = tree
            .dirs
            .iter()
            .filter(|d| d.parent() == Some(path))
            .map(|d| DirEntry {
                path: d.clone(),
                is_dir: true,
            })
            .chain(
                tree.files
                    .keys()
                    .filter(|f| f.parent() == Some(path))
                    .map(|f| DirEntry {
                        path: f.clone(),
                        is_dir: false,
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        tree.add_parents(path);
        tree.dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        let mut tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !tree.dirs.contains(parent) => {
                Err(not_found(parent))
            }
            _ => {
                tree.files.insert(path.to_path_buf(), contents.to_vec());
                Ok(())
            }
        }
    }
}
