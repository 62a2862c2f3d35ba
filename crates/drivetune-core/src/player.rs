//! Offline playback queue manager.
//!
//! [`PlaybackQueueManager`] plays tracks from the local cache in list order.
//! It owns a [`PlaybackQueue`] snapshot, drives a [`MediaEngine`], and
//! broadcasts [`PlaybackEvent`]s to any number of subscribers.
//!
//! Only cached tracks can be played. Asking for an uncached track halts the
//! current one, leaves the manager `Idle`, and reports
//! [`PlaybackError::NotAvailableOffline`].
//!
//! End-of-track reports are tagged with the [`LoadToken`] of the load they
//! belong to. Only the token of the active load advances the queue, so a late
//! or duplicated report can never skip a track.
//!
//! The manager takes `&mut self` for every mutation. Share it across tasks
//! through [`crate::player_task::spawn_player`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::catalog::CatalogItem;
use crate::engine::{CompletionNotifier, LoadToken, MediaEngine, MediaSource};
use crate::error::{Error, PlaybackError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::queue::PlaybackQueue;

/// Capacity of the event broadcast channel. Slow subscribers lag past this.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Builds a media engine on first use.
pub type EngineFactory<E> = Box<dyn FnMut() -> Result<E> + Send>;

/// Player lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Nothing playing.
    #[default]
    Idle,
    /// A track is being loaded.
    Loading,
    /// A track is playing.
    Playing,
    /// A track is loaded and paused.
    Paused,
    /// The engine was released.
    Stopped,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Loading => write!(f, "Loading"),
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Notification broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A track is about to be loaded.
    Loading {
        /// Track.
        item: CatalogItem,
        /// Position in the queue.
        index: usize,
    },
    /// A track started playing.
    Started {
        /// Track.
        item: CatalogItem,
        /// Position in the queue.
        index: usize,
    },
    /// A track played to its end.
    Finished(CatalogItem),
    /// Playback was paused or resumed.
    PlaybackToggled {
        /// Whether audio is now playing.
        playing: bool,
    },
    /// The engine was released.
    Stopped,
    /// Something went wrong.
    Error(PlaybackError),
}

/// Point-in-time view of the player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    /// Lifecycle state.
    pub state: PlayerState,
    /// Cursor position, `None` before anything was queued.
    pub current_index: Option<usize>,
    /// Track under the cursor.
    pub current_item: Option<CatalogItem>,
    /// Number of queued tracks.
    pub queue_len: usize,
    /// Whether `next` would move.
    pub has_next: bool,
    /// Whether `previous` would move.
    pub has_previous: bool,
    /// Playback position.
    pub position: Duration,
    /// Length of the loaded track.
    pub duration: Option<Duration>,
}

/// Plays cached tracks in queue order.
pub struct PlaybackQueueManager<E: MediaEngine, F: FileSystem = RealFileSystem> {
    cache: Arc<CacheStore<F>>,
    factory: EngineFactory<E>,
    engine: Option<E>,
    notifier: CompletionNotifier,
    queue: PlaybackQueue,
    state: PlayerState,
    last_token: LoadToken,
    active: Option<LoadToken>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl<E: MediaEngine, F: FileSystem> PlaybackQueueManager<E, F> {
    /// Create a manager. The engine is built by `factory` on the first play.
    pub fn new<Fac>(cache: Arc<CacheStore<F>>, factory: Fac, notifier: CompletionNotifier) -> Self
    where
        Fac: FnMut() -> Result<E> + Send + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            cache,
            factory: Box::new(factory),
            engine: None,
            notifier,
            queue: PlaybackQueue::default(),
            state: PlayerState::Idle,
            last_token: LoadToken::default(),
            active: None,
            events,
        }
    }

    /// Subscribe to playback events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Sender side of the event channel, for handing out more subscriptions.
    pub fn event_sender(&self) -> broadcast::Sender<PlaybackEvent> {
        self.events.clone()
    }

    /// Replace the queue with `items` and play the one at `index`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidIndex`] if `index` is out of range; nothing changes.
    /// - [`PlaybackError::NotAvailableOffline`] if the track is not cached.
    /// - [`PlaybackError::Engine`] if the engine cannot be created or fails to load.
    pub fn play(&mut self, items: Vec<CatalogItem>, index: usize) -> Result<()> {
        self.queue = PlaybackQueue::new(items, index)?;
        self.start_current()
    }

    /// Play the following track. Does nothing at the end of the queue.
    pub fn next(&mut self) -> Result<()> {
        if !self.queue.advance() {
            debug!("Already at the last track");
            return Ok(());
        }
        self.start_current()
    }

    /// Play the preceding track. Does nothing at the start of the queue.
    pub fn previous(&mut self) -> Result<()> {
        if !self.queue.retreat() {
            debug!("Already at the first track");
            return Ok(());
        }
        self.start_current()
    }

    /// React to the engine reporting that the load `token` reached its end.
    ///
    /// Reports for anything but the active load are ignored.
    pub fn handle_end_of_track(&mut self, token: LoadToken) -> Result<()> {
        if self.active != Some(token) {
            debug!("Ignoring end-of-track for stale {}", token);
            return Ok(());
        }

        self.active = None;
        if let Some(engine) = self.engine.as_mut() {
            engine.unwatch_completion(token);
        }
        self.state = PlayerState::Idle;
        if let Some(item) = self.queue.current().cloned() {
            info!("Finished \"{}\"", item.name);
            self.emit(PlaybackEvent::Finished(item));
        }

        self.next()
    }

    /// Pause if playing, resume if paused.
    pub fn toggle_play_pause(&mut self) {
        match self.state {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.resume(),
            _ => debug!("Nothing to toggle in state {}", self.state),
        }
    }

    /// Pause the loaded track.
    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing || self.active.is_none() {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
            self.state = PlayerState::Paused;
            self.emit(PlaybackEvent::PlaybackToggled { playing: false });
        }
    }

    /// Resume the loaded track.
    pub fn resume(&mut self) {
        if self.state != PlayerState::Paused || self.active.is_none() {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.play();
            self.state = PlayerState::Playing;
            self.emit(PlaybackEvent::PlaybackToggled { playing: true });
        }
    }

    /// Release the engine. The next play builds a new one.
    pub fn stop(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        if let Some(token) = self.active.take() {
            engine.unwatch_completion(token);
        }
        engine.release();
        self.state = PlayerState::Stopped;
        info!("Playback stopped");
        self.emit(PlaybackEvent::Stopped);
    }

    /// Seek within the loaded track.
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        match self.engine.as_mut() {
            Some(engine) if self.active.is_some() => engine.seek(position),
            _ => Ok(()),
        }
    }

    /// Playback position of the loaded track.
    pub fn position(&self) -> Duration {
        self.engine.as_ref().map_or(Duration::ZERO, MediaEngine::position)
    }

    /// Length of the loaded track.
    pub fn duration(&self) -> Option<Duration> {
        self.engine.as_ref().and_then(MediaEngine::duration)
    }

    /// Whether the engine is producing audio.
    pub fn is_playing(&self) -> bool {
        self.engine.as_ref().is_some_and(MediaEngine::is_playing)
    }

    /// Lifecycle state.
    pub const fn state(&self) -> PlayerState {
        self.state
    }

    /// Cursor position, `None` before anything was queued.
    pub fn current_index(&self) -> Option<usize> {
        (!self.queue.is_empty()).then(|| self.queue.current_index())
    }

    /// Track under the cursor.
    pub fn current_item(&self) -> Option<&CatalogItem> {
        self.queue.current()
    }

    /// The queued tracks.
    pub fn items(&self) -> &[CatalogItem] {
        self.queue.items()
    }

    /// Whether `next` would move.
    pub fn has_next(&self) -> bool {
        self.queue.has_next()
    }

    /// Whether `previous` would move.
    pub fn has_previous(&self) -> bool {
        self.queue.has_previous()
    }

    /// Up to `count` tracks after the current one.
    pub fn upcoming(&self, count: usize) -> impl Iterator<Item = &CatalogItem> + '_ {
        self.queue.upcoming(count)
    }

    /// Token of the load whose completion is being watched.
    pub const fn active_token(&self) -> Option<LoadToken> {
        self.active
    }

    /// Snapshot for display.
    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            current_index: self.current_index(),
            current_item: self.current_item().cloned(),
            queue_len: self.queue.len(),
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            position: self.position(),
            duration: self.duration(),
        }
    }

    fn start_current(&mut self) -> Result<()> {
        let Some(item) = self.queue.current().cloned() else {
            return Ok(());
        };
        let index = self.queue.current_index();

        let Some(path) = self.cache.resolve(&item.name) else {
            warn!("\"{}\" is not cached, cannot play", item.name);
            self.halt();
            return self.fail(PlaybackError::NotAvailableOffline { name: item.name });
        };

        debug!("Loading \"{}\" from {}", item.name, path.display());
        self.state = PlayerState::Loading;
        self.emit(PlaybackEvent::Loading {
            item: item.clone(),
            index,
        });

        let previous = self.active.take();
        let token = self.last_token.next();
        self.last_token = token;
        let notifier = self.notifier.clone();

        let started = self.ensure_engine().and_then(|engine| {
            if let Some(previous) = previous {
                engine.unwatch_completion(previous);
            }
            engine.load(&MediaSource::File(path))?;
            engine.watch_completion(token, notifier);
            engine.play();
            Ok(())
        });

        if let Err(e) = started {
            // The previous track may still be audible with nobody watching it.
            if let Some(engine) = self.engine.as_mut() {
                engine.pause();
            }
            return self.fail(engine_error(e));
        }

        self.active = Some(token);
        self.state = PlayerState::Playing;
        info!("Playing \"{}\" ({}/{})", item.name, index + 1, self.queue.len());
        self.emit(PlaybackEvent::Started { item, index });
        Ok(())
    }

    /// Stop reporting completion for the loaded track and silence it.
    fn halt(&mut self) {
        let active = self.active.take();
        if let Some(engine) = self.engine.as_mut() {
            if let Some(token) = active {
                engine.unwatch_completion(token);
            }
            engine.pause();
        }
    }

    fn fail(&mut self, error: PlaybackError) -> Result<()> {
        self.state = PlayerState::Idle;
        self.emit(PlaybackEvent::Error(error.clone()));
        Err(error.into())
    }

    fn ensure_engine(&mut self) -> Result<&mut E> {
        if self.engine.is_none() {
            debug!("Creating media engine");
            self.engine = Some((self.factory)()?);
        }
        self.engine
            .as_mut()
            .ok_or_else(|| PlaybackError::Engine("engine unavailable".to_string()).into())
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn engine_error(error: Error) -> PlaybackError {
    match error {
        Error::Playback(e) => e,
        other => PlaybackError::Engine(other.to_string()),
    }
}

impl<E: MediaEngine, F: FileSystem> fmt::Debug for PlaybackQueueManager<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackQueueManager")
            .field("state", &self.state)
            .field("queue_len", &self.queue.len())
            .field("current_index", &self.current_index())
            .field("active", &self.active)
            .field("engine_loaded", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}
