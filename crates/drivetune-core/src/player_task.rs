//! Player running on its own tokio task.
//!
//! [`spawn_player`] moves a [`PlaybackQueueManager`] onto a task that owns
//! it exclusively. Callers talk to it through a cloneable [`PlayerHandle`];
//! every request, and every end-of-track report from the engine, goes
//! through one command channel and is applied in arrival order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::catalog::CatalogItem;
use crate::engine::{CompletionNotifier, LoadToken, MediaEngine};
use crate::error::{PlaybackError, Result};
use crate::fs::FileSystem;
use crate::player::{PlaybackEvent, PlaybackQueueManager, PlayerStatus};

/// Request sent to the player task.
#[derive(Debug)]
enum Command {
    Play {
        items: Vec<CatalogItem>,
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Next {
        reply: oneshot::Sender<Result<()>>,
    },
    Previous {
        reply: oneshot::Sender<Result<()>>,
    },
    TogglePlayPause {
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Seek {
        position: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    Upcoming {
        count: usize,
        reply: oneshot::Sender<Vec<CatalogItem>>,
    },
    Status {
        reply: oneshot::Sender<PlayerStatus>,
    },
    EndOfTrack(LoadToken),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running player task.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PlaybackEvent>,
}

/// Start a player task on the current tokio runtime.
///
/// The engine is built by `factory` on the first play and again after each
/// stop.
pub fn spawn_player<E, F, Fac>(cache: Arc<CacheStore<F>>, factory: Fac) -> PlayerHandle
where
    E: MediaEngine + 'static,
    F: FileSystem + 'static,
    Fac: FnMut() -> Result<E> + Send + 'static,
{
    let (commands, receiver) = mpsc::unbounded_channel();

    // A weak sender, so engine callbacks do not keep the task alive.
    let completions = commands.downgrade();
    let notifier = CompletionNotifier::new(move |token| {
        if let Some(sender) = completions.upgrade()
            && sender.send(Command::EndOfTrack(token)).is_err()
        {
            debug!("Player task gone, dropping end-of-track for {}", token);
        }
    });

    let manager = PlaybackQueueManager::new(cache, factory, notifier);
    let events = manager.event_sender();
    tokio::spawn(run(manager, receiver));

    info!("Player task started");
    PlayerHandle { commands, events }
}

async fn run<E, F>(mut manager: PlaybackQueueManager<E, F>, mut commands: mpsc::UnboundedReceiver<Command>)
where
    E: MediaEngine,
    F: FileSystem,
{
    while let Some(command) = commands.recv().await {
        match command {
            Command::Play {
                items,
                index,
                reply,
            } => {
                let _ = reply.send(manager.play(items, index));
            }
            Command::Next { reply } => {
                let _ = reply.send(manager.next());
            }
            Command::Previous { reply } => {
                let _ = reply.send(manager.previous());
            }
            Command::TogglePlayPause { reply } => {
                manager.toggle_play_pause();
                let _ = reply.send(());
            }
            Command::Pause { reply } => {
                manager.pause();
                let _ = reply.send(());
            }
            Command::Resume { reply } => {
                manager.resume();
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                manager.stop();
                let _ = reply.send(());
            }
            Command::Seek { position, reply } => {
                let _ = reply.send(manager.seek(position));
            }
            Command::Upcoming { count, reply } => {
                let _ = reply.send(manager.upcoming(count).cloned().collect());
            }
            Command::Status { reply } => {
                let _ = reply.send(manager.status());
            }
            Command::EndOfTrack(token) => {
                if let Err(e) = manager.handle_end_of_track(token) {
                    warn!("Could not continue after end of track: {}", e);
                }
            }
            Command::Shutdown { reply } => {
                manager.stop();
                commands.close();
                let _ = reply.send(());
                break;
            }
        }
    }
    info!("Player task stopped");
}

impl PlayerHandle {
    /// Subscribe to playback events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Replace the queue and play `items[index]`.
    pub async fn play(&self, items: Vec<CatalogItem>, index: usize) -> Result<()> {
        self.request(|reply| Command::Play {
            items,
            index,
            reply,
        })
        .await?
    }

    /// Play the following track.
    pub async fn next(&self) -> Result<()> {
        self.request(|reply| Command::Next { reply }).await?
    }

    /// Play the preceding track.
    pub async fn previous(&self) -> Result<()> {
        self.request(|reply| Command::Previous { reply }).await?
    }

    /// Pause or resume.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(|reply| Command::TogglePlayPause { reply })
            .await
    }

    /// Pause.
    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Resume.
    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Release the engine.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Seek within the current track.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::Seek { position, reply })
            .await?
    }

    /// Up to `count` tracks after the current one.
    pub async fn upcoming(&self, count: usize) -> Result<Vec<CatalogItem>> {
        self.request(|reply| Command::Upcoming { count, reply })
            .await
    }

    /// Current player status.
    pub async fn status(&self) -> Result<PlayerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stop playback and end the task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Whether the task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| PlaybackError::PlayerClosed)?;
        response
            .await
            .map_err(|_| PlaybackError::PlayerClosed.into())
    }
}
