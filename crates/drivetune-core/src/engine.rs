//! Media engine seam.
//!
//! Audio decoding and output are provided by the platform. The player drives
//! whatever implements [`MediaEngine`] and learns about natural end-of-track
//! through a [`CompletionNotifier`] tagged with the [`LoadToken`] of the load
//! that finished.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Something the engine can load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A local file.
    File(PathBuf),
    /// A remote stream with request headers.
    Remote {
        /// Stream URL.
        url: String,
        /// Extra request headers, e.g. authorization.
        headers: HashMap<String, String>,
    },
}

/// Generation number of a load. Each successful load gets a fresh token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(u64);

impl LoadToken {
    /// Wrap a raw generation number.
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// Raw generation number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// Callback the engine invokes when a watched load plays to the end.
#[derive(Clone)]
pub struct CompletionNotifier {
    callback: Arc<dyn Fn(LoadToken) + Send + Sync>,
}

impl CompletionNotifier {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(LoadToken) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// A notifier that drops every notification.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report that the load identified by `token` reached its end.
    pub fn notify(&self, token: LoadToken) {
        (self.callback)(token);
    }
}

impl fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier").finish_non_exhaustive()
    }
}

/// Platform audio engine.
///
/// An engine holds at most one loaded item. It must call
/// [`CompletionNotifier::notify`] at most once per watched token, and never
/// after [`MediaEngine::unwatch_completion`] for that token.
pub trait MediaEngine: Send {
    /// Load a source, replacing whatever was loaded. Does not start playback.
    fn load(&mut self, source: &MediaSource) -> Result<()>;

    /// Start or resume playback.
    fn play(&mut self);

    /// Pause playback.
    fn pause(&mut self);

    /// Whether audio is currently playing.
    fn is_playing(&self) -> bool;

    /// Jump to a position in the loaded item.
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Length of the loaded item, when known.
    fn duration(&self) -> Option<Duration>;

    /// Start reporting end-of-track for the current load.
    fn watch_completion(&mut self, token: LoadToken, notifier: CompletionNotifier);

    /// Stop reporting end-of-track for `token`.
    fn unwatch_completion(&mut self, token: LoadToken);

    /// Release the loaded item and any platform resources.
    fn release(&mut self);
}

#[cfg(test)]
pub mod fake {
    //! Recording engine for tests.

    use super::*;
    use crate::error::{Error, PlaybackError};
    use std::sync::Mutex;

    /// A command the fake engine received.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum EngineCall {
        /// `load`
        Load(MediaSource),
        /// `play`
        Play,
        /// `pause`
        Pause,
        /// `seek`
        Seek(Duration),
        /// `watch_completion`
        Watch(LoadToken),
        /// `unwatch_completion`
        Unwatch(LoadToken),
        /// `release`
        Release,
    }

    /// State shared between a [`FakeEngine`] and the test that created it.
    #[derive(Debug, Default)]
    pub struct FakeEngineState {
        /// Every call in order.
        pub calls: Vec<EngineCall>,
        /// Watched tokens and their notifiers.
        pub watchers: Vec<(LoadToken, CompletionNotifier)>,
        /// Fail the next `load`.
        pub fail_next_load: bool,
        /// Number of engines created by the factory.
        pub created: usize,
    }

    /// Engine that records every call into shared state.
    #[derive(Debug, Clone, Default)]
    pub struct FakeEngine {
        /// Shared state.
        pub state: Arc<Mutex<FakeEngineState>>,
        playing: bool,
        position: Duration,
    }

    impl FakeEngine {
        /// Engine sharing `state`.
        pub fn with_state(state: Arc<Mutex<FakeEngineState>>) -> Self {
            Self {
                state,
                playing: false,
                position: Duration::ZERO,
            }
        }

        fn record(&self, call: EngineCall) {
            self.state.lock().expect("lock poisoned").calls.push(call);
        }
    }

    impl FakeEngineState {
        /// Simulate the engine reaching the end of the item loaded under `token`.
        pub fn finish(&self, token: LoadToken) {
            for (watched, notifier) in &self.watchers {
                if *watched == token {
                    notifier.notify(token);
                }
            }
        }

        /// Calls matching a predicate.
        pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }
    }

    impl MediaEngine for FakeEngine {
        fn load(&mut self, source: &MediaSource) -> Result<()> {
            let mut state = self.state.lock().expect("lock poisoned");
            state.calls.push(EngineCall::Load(source.clone()));
            if state.fail_next_load {
                state.fail_next_load = false;
                return Err(Error::Playback(PlaybackError::Engine(
                    "decoder unavailable".to_string(),
                )));
            }
            self.position = Duration::ZERO;
            Ok(())
        }

        fn play(&mut self) {
            self.playing = true;
            self.record(EngineCall::Play);
        }

        fn pause(&mut self) {
            self.playing = false;
            self.record(EngineCall::Pause);
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn seek(&mut self, position: Duration) -> Result<()> {
            self.position = position;
            self.record(EngineCall::Seek(position));
            Ok(())
        }

        fn position(&self) -> Duration {
            self.position
        }

        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(180))
        }

        fn watch_completion(&mut self, token: LoadToken, notifier: CompletionNotifier) {
            let mut state = self.state.lock().expect("lock poisoned");
            state.calls.push(EngineCall::Watch(token));
            state.watchers.push((token, notifier));
        }

        fn unwatch_completion(&mut self, token: LoadToken) {
            let mut state = self.state.lock().expect("lock poisoned");
            state.calls.push(EngineCall::Unwatch(token));
            state.watchers.retain(|(t, _)| *t != token);
        }

        fn release(&mut self) {
            self.playing = false;
            self.record(EngineCall::Release);
        }
    }
}
