//! Local offline cache of downloaded tracks.
//!
//! Tracks are plain files laid out as `cache_root/<folder name>/<track name>`.
//! Lookups are keyed by the track's display name and search the whole tree,
//! so two remote folders holding a file with the same name resolve to the
//! same cached track. [`CacheStore::find_all`] reports such collisions.
//!
//! There is no eviction policy: entries live until [`CacheStore::delete`] or
//! [`CacheStore::delete_all`] removes them.
//!
//! # Example
//!
//! ```rust,ignore
//! use drivetune_core::cache::CacheStore;
//!
//! let cache = CacheStore::new(default_cache_root());
//! if let Some(path) = cache.resolve("intro.mp3") {
//!     println!("playing {}", path.display());
//! }
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::catalog::has_audio_extension;
use crate::error::{CacheError, Error, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Directory below the cache root that holds in-flight downloads.
pub const STAGING_DIR: &str = ".staging";

/// Longest file or folder name written into the cache, in characters.
const MAX_COMPONENT_CHARS: usize = 200;

/// Longest suffix, dot included, treated as an extension when shortening.
const MAX_EXTENSION_CHARS: usize = 16;

/// Characters that may not appear in a cache path component.
const INVALID_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Result of committing a downloaded file into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was moved into place.
    Stored(PathBuf),
    /// A file already existed at the target; the source was discarded.
    AlreadyPresent(PathBuf),
}

impl WriteOutcome {
    /// Final location of the cached file.
    pub fn path(&self) -> &Path {
        match self {
            Self::Stored(path) | Self::AlreadyPresent(path) => path,
        }
    }
}

/// A cached track, as listed in the offline library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File name, equal to the remote item name.
    pub name: String,
    /// Absolute path of the cached file.
    pub path: PathBuf,
    /// Folder below the cache root, if any.
    pub subfolder: Option<String>,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Aggregate figures about the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached files.
    pub entry_count: usize,
    /// Total size of cached files in bytes.
    pub total_bytes: u64,
}

/// Name-keyed store of downloaded tracks.
#[derive(Debug)]
pub struct CacheStore<F: FileSystem = RealFileSystem> {
    root: PathBuf,
    fs: F,
    /// Serializes the check-then-move sequence in [`Self::write`].
    write_lock: Mutex<()>,
}

impl CacheStore<RealFileSystem> {
    /// Create a store on the real file system.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(root, RealFileSystem::new())
    }
}

impl<F: FileSystem> CacheStore<F> {
    /// Create a store over a custom file system.
    pub fn with_fs(root: impl Into<PathBuf>, fs: F) -> Self {
        let root = root.into();
        debug!("Cache store rooted at {}", root.display());
        Self {
            root,
            fs,
            write_lock: Mutex::new(()),
        }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a track with this name is cached anywhere below the root.
    pub fn exists(&self, name: &str) -> bool {
        !self.find_all(name).is_empty()
    }

    /// Path to play for `name`, if cached.
    ///
    /// When several folders hold the same name, the first match in path order
    /// wins and the collision is logged.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut matches = self.find_all(name);
        if matches.len() > 1 {
            warn!(
                "{} cached files are named \"{}\", using {}",
                matches.len(),
                name,
                matches[0].display()
            );
        }
        if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        }
    }

    /// Every cached file named `name`, in path order.
    pub fn find_all(&self, name: &str) -> Vec<PathBuf> {
        let Some(key) = sanitize_component(name) else {
            return Vec::new();
        };

        let mut matches: Vec<PathBuf> = self
            .visible_files()
            .into_iter()
            .filter(|path| path.file_name().is_some_and(|n| n == key.as_str()))
            .collect();
        matches.sort();
        matches
    }

    /// Move a downloaded file into `root/<subfolder>/<name>`.
    ///
    /// If a file already sits at the target, the source is removed and
    /// [`WriteOutcome::AlreadyPresent`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidName`] for a name that sanitizes to nothing,
    /// or a file system error if the directory cannot be created or the move fails.
    pub fn write(&self, name: &str, source: &Path, subfolder: Option<&str>) -> Result<WriteOutcome> {
        let file_name = sanitize_component(name).ok_or_else(|| {
            Error::Cache(CacheError::InvalidName {
                name: name.to_string(),
            })
        })?;
        let dir = match subfolder.and_then(sanitize_component) {
            Some(folder) => self.root.join(folder),
            None => self.root.clone(),
        };
        let target = dir.join(file_name);

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.fs.exists(&target) {
            debug!("{} already cached, discarding download", target.display());
            if let Err(e) = self.fs.remove_file(source) {
                warn!("Failed to remove staged file {}: {}", source.display(), e);
            }
            return Ok(WriteOutcome::AlreadyPresent(target));
        }

        self.fs.create_dir_all(&dir)?;
        self.fs.move_file(source, &target)?;
        info!("Cached {}", target.display());
        Ok(WriteOutcome::Stored(target))
    }

    /// Remove the first cached file named `name`.
    ///
    /// Returns `false` (and logs) when nothing matched or removal failed.
    pub fn delete(&self, name: &str) -> bool {
        let Some(path) = self.find_all(name).into_iter().next() else {
            warn!("Cannot delete \"{}\": not in cache", name);
            return false;
        };

        match self.fs.remove_file(&path) {
            Ok(()) => {
                info!("Deleted cached file {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to delete cached file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Remove the whole cache directory. Succeeds when it is already gone.
    ///
    /// # Errors
    ///
    /// Returns a file system error if the directory exists but cannot be removed.
    pub fn delete_all(&self) -> Result<()> {
        if !self.fs.exists(&self.root) {
            debug!("Cache root {} already absent", self.root.display());
            return Ok(());
        }
        self.fs.remove_dir_all(&self.root)?;
        info!("Cleared cache at {}", self.root.display());
        Ok(())
    }

    /// The offline library: cached audio files sorted by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns a file system error if the cache tree cannot be read.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for path in self.walk_visible()? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !has_audio_extension(name) {
                continue;
            }
            entries.push(CacheEntry {
                name: name.to_string(),
                subfolder: self.subfolder_of(&path),
                size_bytes: self.fs.file_len(&path)?,
                path,
            });
        }

        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(entries)
    }

    /// Count and total size of everything cached.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for path in self.visible_files() {
            stats.entry_count += 1;
            match self.fs.file_len(&path) {
                Ok(len) => stats.total_bytes += len,
                Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
            }
        }
        stats
    }

    /// Create a temporary file for an in-flight download.
    ///
    /// The file lives in `root/.staging`, on the same volume as the cache,
    /// and is removed on drop unless it was moved into place.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::StagingFailed`] if the file cannot be created.
    pub fn staging_file(&self) -> Result<NamedTempFile> {
        let dir = self.root.join(STAGING_DIR);
        self.fs.create_dir_all(&dir)?;
        tempfile::Builder::new()
            .prefix("download-")
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(|e| {
                Error::Cache(CacheError::StagingFailed {
                    reason: e.to_string(),
                })
            })
    }

    /// Files below the root, skipping hidden directories such as staging.
    fn walk_visible(&self) -> Result<Vec<PathBuf>> {
        let files = self.fs.walk_files(&self.root)?;
        Ok(files
            .into_iter()
            .filter(|path| !self.is_hidden(path))
            .collect())
    }

    fn visible_files(&self) -> Vec<PathBuf> {
        self.walk_visible().unwrap_or_else(|e| {
            warn!("Failed to scan cache at {}: {}", self.root.display(), e);
            Vec::new()
        })
    }

    fn is_hidden(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root).map_or(true, |rel| {
            rel.components().any(|c| match c {
                Component::Normal(part) => part.to_string_lossy().starts_with('.'),
                _ => true,
            })
        })
    }

    fn subfolder_of(&self, path: &Path) -> Option<String> {
        let parent = path.parent()?.strip_prefix(&self.root).ok()?;
        if parent.as_os_str().is_empty() {
            None
        } else {
            Some(parent.to_string_lossy().into_owned())
        }
    }
}

/// Make a remote name safe to use as a single path component.
///
/// Separators and reserved characters become `_`, surrounding whitespace and
/// dots are trimmed, and the result is capped in length. Returns `None` when
/// nothing usable is left.
pub fn sanitize_component(name: &str) -> Option<String> {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = trim_component(&replaced);
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= MAX_COMPONENT_CHARS {
        return Some(trimmed.to_string());
    }

    // Shorten the stem so the extension survives.
    let (stem, ext) = match trimmed.rfind('.') {
        Some(dot) if dot > 0 && trimmed[dot..].chars().count() <= MAX_EXTENSION_CHARS => {
            trimmed.split_at(dot)
        }
        _ => (trimmed, ""),
    };
    let stem: String = stem
        .chars()
        .take(MAX_COMPONENT_CHARS - ext.chars().count())
        .collect();
    let shortened = format!("{}{ext}", trim_component(&stem));
    let shortened = trim_component(&shortened);
    (!shortened.is_empty()).then(|| shortened.to_string())
}

fn trim_component(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Default cache location: `<data dir>/drivetune/offline`.
pub fn default_cache_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drivetune")
        .join("offline")
}
