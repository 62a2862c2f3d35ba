//! `Drivetune` Core Library
//!
//! This crate provides the core functionality for the `Drivetune` application:
//! - Browsing a cloud drive catalog over its REST API
//! - Downloading remote folders into a local offline cache
//! - Queued playback of cached tracks with end-of-track auto-advance
//! - Application configuration, including hidden folders
//!
//! # Error Handling
//!
//! Errors are typed per domain and wrapped by a single [`Error`]. See the
//! [`error`] module for details.
//!
//! ```rust,ignore
//! use drivetune_core::{CacheStore, Result};
//!
//! fn offline_names(cache: &CacheStore) -> Result<Vec<String>> {
//!     Ok(cache.entries()?.into_iter().map(|e| e.name).collect())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod offline;
pub mod player;
pub mod player_task;
pub mod queue;

pub use auth::{CredentialProvider, SilentFirst, StaticToken, TokenSource};
pub use cache::{
    CacheEntry, CacheStats, CacheStore, STAGING_DIR, WriteOutcome, default_cache_root,
    sanitize_component,
};
pub use catalog::{
    Catalog, CatalogConfig, CatalogItem, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, GraphCatalogClient, ItemKind, ListingPage, has_audio_extension,
    list_all_children, sort_for_display,
};
pub use config::{AppConfig, ConfigManager, PlaybackConfig};
pub use engine::{CompletionNotifier, LoadToken, MediaEngine, MediaSource};
pub use error::{
    AuthError, CacheError, CatalogError, Error, ErrorContext, ErrorKind, FileSystemError,
    PlaybackError, Result,
};
pub use fs::{FileSystem, RealFileSystem};
pub use offline::{FailureScope, OfflineSync, SyncEvent, SyncFailure, SyncOptions, SyncReport};
pub use player::{
    EVENT_CHANNEL_CAPACITY, EngineFactory, PlaybackEvent, PlaybackQueueManager, PlayerState,
    PlayerStatus,
};
pub use player_task::{PlayerHandle, spawn_player};
pub use queue::{DEFAULT_UPCOMING_COUNT, PlaybackQueue};
