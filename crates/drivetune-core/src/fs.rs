//! Disk access seam for the offline cache.
//!
//! [`CacheStore`](crate::cache::CacheStore) never touches `std::fs` directly.
//! Production code uses [`RealFileSystem`]; tests swap in the in-memory
//! `mock::MockFileSystem` so lookup and bookkeeping can run without a disk.
//!
//! ```rust,ignore
//! use drivetune_core::fs::{FileSystem, RealFileSystem};
//!
//! let tracks = RealFileSystem::new().walk_files(Path::new("/music/offline"))?;
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, ErrorContext, FileSystemError, Result};

/// The disk operations the cache needs.
pub trait FileSystem: Send + Sync {
    /// Whole file contents.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// `mkdir -p`.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove `path` and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Rename `from` to `to`, copying and removing when they sit on different devices.
    fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Size in bytes.
    fn file_len(&self, path: &Path) -> Result<u64>;

    /// Every regular file below `root`. A missing root yields an empty list.
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// [`FileSystem`] over `std::fs` and `walkdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    /// Handle onto the real disk.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn mkdir_failed(path: &Path, e: &io::Error) -> Error {
    FileSystemError::CreateDirFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
    .into()
}

fn delete_failed(path: &Path, e: &io::Error) -> Error {
    FileSystemError::DeleteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
    .into()
}

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).read_context(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| mkdir_failed(path, &e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| delete_failed(path, &e))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(|e| delete_failed(path, &e))
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        let Err(rename_err) = fs::rename(from, to) else {
            return Ok(());
        };

        // Staging and cache may sit on different devices.
        debug!(
            "Rename {} -> {} failed ({}), copying instead",
            from.display(),
            to.display(),
            rename_err
        );
        fs::copy(from, to).map_err(|e| {
            Error::from(FileSystemError::MoveFailed {
                source_path: from.to_path_buf(),
                destination: to.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        fs::remove_file(from).map_err(|e| delete_failed(from, &e))
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        fs::metadata(path).map(|m| m.len()).read_context(path)
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Ok(Vec::new());
        }

        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(Error::from(FileSystemError::ReadFailed {
                    path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
                    reason: e.to_string(),
                }))),
            })
            .collect()
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory [`FileSystem`] for unit tests.

    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Tree {
        files: BTreeMap<PathBuf, Vec<u8>>,
        dirs: BTreeSet<PathBuf>,
    }

    impl Tree {
        fn add_dir(&mut self, path: &Path) {
            for dir in path.ancestors() {
                if dir.as_os_str().is_empty() {
                    break;
                }
                self.dirs.insert(dir.to_path_buf());
            }
        }

        fn missing(path: &Path) -> Error {
            FileSystemError::NotFound {
                path: path.to_path_buf(),
            }
            .into()
        }
    }

    /// Files and directories held in a map. Clones share the same tree.
    #[derive(Debug, Clone, Default)]
    pub struct MockFileSystem {
        tree: Arc<Mutex<Tree>>,
    }

    impl MockFileSystem {
        /// Empty tree.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn tree(&self) -> std::sync::MutexGuard<'_, Tree> {
            self.tree.lock().expect("mock fs lock")
        }

        /// Put a file (and its parent directories) in place.
        pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
            let path = path.as_ref();
            let mut tree = self.tree();
            if let Some(parent) = path.parent() {
                tree.add_dir(parent);
            }
            tree.files
                .insert(path.to_path_buf(), contents.as_bytes().to_vec());
        }

        /// Put a directory and its ancestors in place.
        pub fn add_dir(&self, path: impl AsRef<Path>) {
            self.tree().add_dir(path.as_ref());
        }

        /// Whether a file sits at `path`.
        pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
            self.tree().files.contains_key(path.as_ref())
        }

        /// Whether a directory sits at `path`.
        pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
            self.tree().dirs.contains(path.as_ref())
        }

        /// Number of files in the tree.
        #[must_use]
        pub fn file_count(&self) -> usize {
            self.tree().files.len()
        }
    }

    impl FileSystem for MockFileSystem {
        fn read(&self, path: &Path) -> Result<Vec<u8>> {
            self.tree()
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| Tree::missing(path))
        }

        fn exists(&self, path: &Path) -> bool {
            let tree = self.tree();
            tree.files.contains_key(path) || tree.dirs.contains(path)
        }

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            self.tree().add_dir(path);
            Ok(())
        }

        fn remove_file(&self, path: &Path) -> Result<()> {
            self.tree()
                .files
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| Tree::missing(path))
        }

        fn remove_dir_all(&self, path: &Path) -> Result<()> {
            let mut tree = self.tree();
            tree.files.retain(|p, _| !p.starts_with(path));
            tree.dirs.retain(|p| !p.starts_with(path));
            Ok(())
        }

        fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
            let mut tree = self.tree();
            let contents = tree.files.remove(from).ok_or_else(|| Tree::missing(from))?;
            if let Some(parent) = to.parent() {
                tree.add_dir(parent);
            }
            tree.files.insert(to.to_path_buf(), contents);
            Ok(())
        }

        fn file_len(&self, path: &Path) -> Result<u64> {
            Ok(self.read(path)?.len() as u64)
        }

        fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
            Ok(self
                .tree()
                .files
                .keys()
                .filter(|p| p.starts_with(root))
                .cloned()
                .collect())
        }
    }
}
