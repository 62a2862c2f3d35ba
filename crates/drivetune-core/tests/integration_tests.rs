//! Integration tests for `Drivetune` core workflows.
//!
//! These tests run the public API end to end:
//! - Offline download of a remote tree into a temp-dir cache
//! - Browsing the offline library and building a queue from it
//! - Playback through the player task with engine-driven auto-advance
//!
//! The remote catalog and the media engine are in-memory stand-ins.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drivetune_core::{
    CacheStore, Catalog, CatalogError, CatalogItem, CompletionNotifier, ConfigManager,
    FailureScope, ListingPage, LoadToken, MediaEngine, MediaSource, OfflineSync, PlaybackError,
    PlaybackEvent, PlayerState, Result, StaticToken, SyncOptions, sort_for_display, spawn_player,
};
use tempfile::TempDir;

// =============================================================================
// Test Fixtures and Utilities
// =============================================================================

/// Remote drive held in memory.
#[derive(Default)]
struct MemoryDrive {
    folders: HashMap<String, Vec<CatalogItem>>,
    contents: HashMap<String, Vec<u8>>,
    fetches: Mutex<usize>,
}

impl MemoryDrive {
    fn with_folder(mut self, id: &str, items: Vec<CatalogItem>) -> Self {
        for item in &items {
            if item.is_file() {
                self.contents
                    .insert(item.id.clone(), format!("bytes of {}", item.name).into_bytes());
            }
        }
        self.folders.insert(id.to_string(), items);
        self
    }
}

impl Catalog for MemoryDrive {
    fn list_children(&self, _token: &str, folder_id: Option<&str>) -> Result<ListingPage> {
        let id = folder_id.unwrap_or("root");
        let items = self.folders.get(id).cloned().ok_or_else(|| {
            CatalogError::NotFound {
                resource: id.to_string(),
            }
        })?;
        Ok(ListingPage {
            items,
            next_link: None,
        })
    }

    fn next_page(&self, _token: &str, next_link: &str) -> Result<ListingPage> {
        Err(CatalogError::NotFound {
            resource: next_link.to_string(),
        }
        .into())
    }

    fn download_locator(&self, _token: &str, item_id: &str) -> Result<String> {
        Ok(format!("mem://{item_id}"))
    }

    fn fetch_content(&self, locator: &str, sink: &mut dyn Write) -> Result<u64> {
        *self.fetches.lock().unwrap() += 1;
        let id = locator.trim_start_matches("mem://");
        let bytes = self.contents.get(id).cloned().unwrap_or_default();
        sink.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Engine that remembers what it loaded and lets the test end the track.
#[derive(Default)]
struct ScriptedEngine {
    shared: Arc<Mutex<EngineLog>>,
    playing: bool,
}

#[derive(Default)]
struct EngineLog {
    loaded: Vec<MediaSource>,
    watching: Option<(LoadToken, CompletionNotifier)>,
}

impl EngineLog {
    fn end_current_track(&mut self) {
        if let Some((token, notifier)) = self.watching.take() {
            notifier.notify(token);
        }
    }
}

impl MediaEngine for ScriptedEngine {
    fn load(&mut self, source: &MediaSource) -> Result<()> {
        self.shared.lock().unwrap().loaded.push(source.clone());
        Ok(())
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn seek(&mut self, _position: Duration) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> Duration {
        Duration::ZERO
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn watch_completion(&mut self, token: LoadToken, notifier: CompletionNotifier) {
        self.shared.lock().unwrap().watching = Some((token, notifier));
    }

    fn unwatch_completion(&mut self, token: LoadToken) {
        let mut log = self.shared.lock().unwrap();
        if log.watching.as_ref().is_some_and(|(t, _)| *t == token) {
            log.watching = None;
        }
    }

    fn release(&mut self) {
        self.playing = false;
    }
}

/// Route library logs to the test output. Safe to call from every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn audio(id: &str, name: &str) -> CatalogItem {
    CatalogItem::file(id, name, Some("audio/mpeg"))
}

fn sample_drive() -> MemoryDrive {
    MemoryDrive::default()
        .with_folder(
            "music",
            vec![
                audio("1", "b-side.mp3"),
                CatalogItem::folder("live", "Live"),
                CatalogItem::file("2", "cover.jpg", Some("image/jpeg")),
                audio("3", "A-side.mp3"),
            ],
        )
        .with_folder("live", vec![audio("4", "encore.mp3")])
}

// =============================================================================
// Offline download
// =============================================================================

#[test]
fn test_offline_download_populates_library() {
    init_tracing();
    let temp = TempDir::new().expect("Failed to create temp dir");
    let cache = Arc::new(CacheStore::new(temp.path().join("offline")));

    let sync = OfflineSync::new(sample_drive(), Arc::clone(&cache), SyncOptions::default());
    let report = sync.download_folder("music", "Music", &StaticToken::new("token"));

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.downloaded, 3);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.folders_visited, 2);

    let names: Vec<_> = cache
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.subfolder))
        .collect();
    assert_eq!(
        names,
        vec![
            ("A-side.mp3".to_string(), Some("Music".to_string())),
            ("b-side.mp3".to_string(), Some("Music".to_string())),
            ("encore.mp3".to_string(), Some("Live".to_string())),
        ]
    );

    // Staging leftovers never show up as cache entries.
    assert_eq!(cache.stats().entry_count, 3);
}

#[test]
fn test_second_download_skips_everything() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let cache = Arc::new(CacheStore::new(temp.path().join("offline")));
    let credentials = StaticToken::new("token");

    OfflineSync::new(sample_drive(), Arc::clone(&cache), SyncOptions::default())
        .download_folder("music", "Music", &credentials);

    let again = OfflineSync::new(sample_drive(), Arc::clone(&cache), SyncOptions::default());
    let report = again.download_folder("music", "Music", &credentials);

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(*again.catalog().fetches.lock().unwrap(), 0);
}

#[test]
fn test_missing_folder_is_reported_not_fatal() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let cache = Arc::new(CacheStore::new(temp.path().join("offline")));
    let drive = MemoryDrive::default().with_folder(
        "music",
        vec![
            CatalogItem::folder("gone", "Gone"),
            audio("1", "still-here.mp3"),
        ],
    );

    let report = OfflineSync::new(drive, Arc::clone(&cache), SyncOptions::default())
        .download_folder("music", "Music", &StaticToken::new("token"));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scope, FailureScope::Folder);
    assert!(cache.exists("still-here.mp3"));
}

#[test]
fn test_delete_and_clear() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let cache = Arc::new(CacheStore::new(temp.path().join("offline")));
    OfflineSync::new(sample_drive(), Arc::clone(&cache), SyncOptions::default())
        .download_folder("music", "Music", &StaticToken::new("token"));

    assert!(cache.delete("encore.mp3"));
    assert!(!cache.exists("encore.mp3"));
    assert!(!cache.delete("encore.mp3"));

    cache.delete_all().unwrap();
    assert!(cache.entries().unwrap().is_empty());
    cache.delete_all().unwrap();
}

// =============================================================================
// Browsing
// =============================================================================

#[test]
fn test_browse_hides_folders() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut config = ConfigManager::open(temp.path().join("config.json")).unwrap();
    config.hide_folder("live").unwrap();

    let drive = sample_drive();
    let page = drive.list_children("token", Some("music")).unwrap();
    let mut items = config.visible_items(page.items);
    sort_for_display(&mut items);

    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["A-side.mp3", "b-side.mp3", "cover.jpg"]);
}

// =============================================================================
// Playback
// =============================================================================

#[tokio::test]
async fn test_play_offline_library_with_auto_advance() {
    init_tracing();
    let temp = TempDir::new().expect("Failed to create temp dir");
    let cache = Arc::new(CacheStore::new(temp.path().join("offline")));
    OfflineSync::new(sample_drive(), Arc::clone(&cache), SyncOptions::default())
        .download_folder("music", "Music", &StaticToken::new("token"));

    let log = Arc::new(Mutex::new(EngineLog::default()));
    let shared = Arc::clone(&log);
    let player = spawn_player(Arc::clone(&cache), move || {
        Ok(ScriptedEngine {
            shared: Arc::clone(&shared),
            playing: false,
        })
    });
    let mut events = player.subscribe();

    // Queue: the offline library plus one track that was never downloaded.
    let mut queue: Vec<CatalogItem> = cache
        .entries()
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, e)| audio(&i.to_string(), &e.name))
        .collect();
    queue.push(audio("x", "never-downloaded.mp3"));

    player.play(queue.clone(), 1).await.unwrap();
    assert_eq!(player.upcoming(5).await.unwrap().len(), 2);

    log.lock().unwrap().end_current_track();
    let status = player.status().await.unwrap();
    assert_eq!(status.current_index, Some(2));
    assert_eq!(status.state, PlayerState::Playing);

    // Auto-advance into the uncached track stops with an error event.
    log.lock().unwrap().end_current_track();
    let status = player.status().await.unwrap();
    assert_eq!(status.current_index, Some(3));
    assert_eq!(status.state, PlayerState::Idle);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&PlaybackEvent::Finished(queue[1].clone())));
    assert!(seen.contains(&PlaybackEvent::Error(
        PlaybackError::NotAvailableOffline {
            name: "never-downloaded.mp3".to_string()
        }
    )));

    let loaded = log.lock().unwrap().loaded.clone();
    assert_eq!(loaded.len(), 2);
    assert!(matches!(&loaded[0], MediaSource::File(p) if p.ends_with("Music/b-side.mp3")));

    player.shutdown().await.unwrap();
}
