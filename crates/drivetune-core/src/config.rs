//! Persisted settings.
//!
//! Handles loading and saving settings, including the offline cache location
//! and the set of remote folders the user has hidden from listings.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::default_cache_root;
use crate::catalog::{CatalogConfig, CatalogItem};
use crate::error::{Error, ErrorContext, Result};
use crate::offline::SyncOptions;
use crate::queue::DEFAULT_UPCOMING_COUNT;

/// Playback preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Length of the "up next" list.
    #[serde(default = "default_upcoming_count")]
    pub upcoming_count: usize,
}

const fn default_upcoming_count() -> usize {
    DEFAULT_UPCOMING_COUNT
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            upcoming_count: DEFAULT_UPCOMING_COUNT,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding downloaded tracks.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    /// Remote catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Offline download settings.
    #[serde(default)]
    pub sync: SyncOptions,
    /// Playback settings.
    #[serde(default)]
    pub playback: PlaybackConfig,
    /// Remote folder ids hidden from listings.
    #[serde(default)]
    pub hidden_folder_ids: BTreeSet<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            catalog: CatalogConfig::default(),
            sync: SyncOptions::default(),
            playback: PlaybackConfig::default(),
            hidden_folder_ids: BTreeSet::new(),
        }
    }
}

impl AppConfig {
    /// Read `config.json` from the platform config directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Read the config at `path`. A missing file yields defaults, which are
    /// written back so the user has something to edit.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for malformed JSON, a file system error when the
    /// file exists but cannot be read.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, starting from defaults", path.display());
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Could not write default config: {}", e);
            }
            return Ok(config);
        }

        let raw = fs::read_to_string(path).read_context(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("{} is not valid: {e}", path.display()))
        })?;

        info!("Loaded config from {}", path.display());
        debug!(
            "Offline cache at {}, {} hidden folder(s)",
            config.cache_root.display(),
            config.hidden_folder_ids.len()
        );
        Ok(config)
    }

    /// Write to the platform config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Write pretty-printed JSON to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).write_context(dir)?;
        }

        fs::write(path, serde_json::to_string_pretty(self)?).write_context(path)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// `<config dir>/drivetune/config.json`.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_default()
        .join("drivetune")
        .join("config.json")
}

/// The cache root must be absolute and writable. A missing one is created.
fn validate_cache_directory(path: &Path) -> Result<()> {
    let invalid = |why: String| Err(Error::Configuration(format!("{}: {why}", path.display())));

    if !path.is_absolute() {
        return invalid("cache directory must be absolute".to_string());
    }
    if !path.exists() {
        return fs::create_dir_all(path)
            .or_else(|e| invalid(format!("cannot create cache directory ({e})")));
    }
    if !path.is_dir() {
        return invalid("not a directory".to_string());
    }

    let marker = path.join(".drivetune_write_test");
    if let Err(e) = fs::write(&marker, b"") {
        return invalid(format!("cache directory is not writable ({e})"));
    }
    let _ = fs::remove_file(&marker);
    Ok(())
}

/// Owns the configuration and persists every change.
#[derive(Debug)]
pub struct ConfigManager {
    config: AppConfig,
    path: PathBuf,
}

impl ConfigManager {
    /// Load from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn new() -> Result<Self> {
        Self::open(config_file_path())
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from(&path)?;
        Ok(Self { config, path })
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// File the configuration is persisted to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offline cache directory.
    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.config.cache_root
    }

    /// Change the offline cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is not absolute or not writable, or
    /// the config cannot be saved.
    pub fn set_cache_root(&mut self, path: PathBuf) -> Result<()> {
        validate_cache_directory(&path)?;
        self.config.cache_root = path;
        info!("Cache directory set to {}", self.config.cache_root.display());
        self.persist()
    }

    /// Hide a folder from listings. Returns `false` if it was already hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn hide_folder(&mut self, folder_id: &str) -> Result<bool> {
        if !self.config.hidden_folder_ids.insert(folder_id.to_string()) {
            return Ok(false);
        }
        info!("Hid folder {}", folder_id);
        self.persist()?;
        Ok(true)
    }

    /// Show a hidden folder again. Returns `false` if it was not hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn unhide_folder(&mut self, folder_id: &str) -> Result<bool> {
        if !self.config.hidden_folder_ids.remove(folder_id) {
            return Ok(false);
        }
        info!("Unhid folder {}", folder_id);
        self.persist()?;
        Ok(true)
    }

    /// Whether a folder is hidden.
    #[must_use]
    pub fn is_hidden(&self, folder_id: &str) -> bool {
        self.config.hidden_folder_ids.contains(folder_id)
    }

    /// Items minus hidden folders. Files are never hidden.
    #[must_use]
    pub fn visible_items(&self, items: Vec<CatalogItem>) -> Vec<CatalogItem> {
        items
            .into_iter()
            .filter(|item| !(item.is_folder() && self.is_hidden(&item.id)))
            .collect()
    }

    /// Only the hidden folders among `items`.
    #[must_use]
    pub fn hidden_items(&self, items: Vec<CatalogItem>) -> Vec<CatalogItem> {
        items
            .into_iter()
            .filter(|item| item.is_folder() && self.is_hidden(&item.id))
            .collect()
    }

    /// Replace the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory is invalid or the config cannot be saved.
    pub fn update(&mut self, config: AppConfig) -> Result<()> {
        validate_cache_directory(&config.cache_root)?;
        self.config = config;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.config.save_to(&self.path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_PAGE_SIZE;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.cache_root.ends_with("drivetune/offline"));
        assert_eq!(config.catalog.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.playback.upcoming_count, 5);
        assert!(!config.sync.follow_next_links);
        assert!(config.hidden_folder_ids.is_empty());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("nested").join("config.json");

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"playback": {"upcoming_count": 3}}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.playback.upcoming_count, 3);
        assert_eq!(config.catalog, CatalogConfig::default());
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_hidden_folders_persist() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("config.json");

        let mut manager = ConfigManager::open(&path).unwrap();
        assert!(manager.hide_folder("F1").unwrap());
        assert!(!manager.hide_folder("F1").unwrap());

        let reloaded = ConfigManager::open(&path).unwrap();
        assert!(reloaded.is_hidden("F1"));

        let mut manager = reloaded;
        assert!(manager.unhide_folder("F1").unwrap());
        assert!(!manager.unhide_folder("F1").unwrap());
        assert!(!ConfigManager::open(&path).unwrap().is_hidden("F1"));
    }

    #[test]
    fn test_visible_and_hidden_items() {
        let temp = TempDir::new().expect("create temp dir");
        let mut manager = ConfigManager::open(temp.path().join("config.json")).unwrap();
        manager.hide_folder("secret").unwrap();

        let items = vec![
            CatalogItem::folder("secret", "Private"),
            CatalogItem::folder("open", "Public"),
            CatalogItem::file("secret", "odd-id.mp3", Some("audio/mpeg")),
        ];

        let visible = manager.visible_items(items.clone());
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|i| i.name != "Private"));

        let hidden = manager.hidden_items(items);
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].name, "Private");
    }

    #[test]
    fn test_set_cache_root_validates() {
        let temp = TempDir::new().expect("create temp dir");
        let mut manager = ConfigManager::open(temp.path().join("config.json")).unwrap();

        let err = manager
            .set_cache_root(PathBuf::from("relative/dir"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let root = temp.path().join("music");
        manager.set_cache_root(root.clone()).unwrap();
        assert!(root.is_dir());
        assert_eq!(
            ConfigManager::open(temp.path().join("config.json"))
                .unwrap()
                .cache_root(),
            root
        );
    }
}
