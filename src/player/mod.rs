//! Playback service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   PlayerCommand + oneshot   ┌──────────────────────┐
//! │ PlayerHandle (many)  │ ──────────────────────────► │   player task        │
//! │ CLI, media controls  │                             │ owns PlaybackSession │
//! └──────────────────────┘ ◄── broadcast snapshots ─── └──────────┬───────────┘
//!                                                                 │ MediaBackend
//!                                                                 ▼
//!                                                    ┌──────────────────────┐
//!                                                    │ AudioEngine          │
//!                                                    │ decoder + cpal thread│
//!                                                    └──────────────────────┘
//! ```
//!
//! Only the player task touches the session. Everything else sends commands
//! and reads [`PlaybackSnapshot`]s.

mod audio;
pub mod backend;
mod decoder;
mod media_controls;
mod resampler;
mod session;
mod state;

pub use audio::AudioEngine;
pub use backend::MediaBackend;
pub use media_controls::{MediaControlCommand, MediaControlsHandle};
pub use session::PlaybackSession;
pub use state::{Interruption, PlaybackSnapshot, PlayerCommand};

use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::model::Song;

/// Shortest completion poll; tokio intervals cannot have a zero period.
const MIN_COMPLETION_POLL: Duration = Duration::from_millis(1);
/// Buffered snapshots per subscriber before it starts lagging.
const SNAPSHOT_CAPACITY: usize = 32;
const COMMAND_CAPACITY: usize = 32;

type Reply = oneshot::Sender<Result<PlaybackSnapshot>>;

struct Envelope {
    command: PlayerCommand,
    reply: Option<Reply>,
}

/// Player service settings.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// How often to check whether the current song finished
    pub completion_poll: Duration,
    /// Register OS media controls
    pub media_controls: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            completion_poll: Duration::from_millis(500),
            media_controls: true,
        }
    }
}

/// Cloneable handle to the player task.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<Envelope>,
    snapshots: broadcast::Sender<PlaybackSnapshot>,
}

impl PlayerHandle {
    /// Spawn the player task on the current runtime.
    pub fn spawn(session: PlaybackSession, options: PlayerOptions) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CAPACITY);

        let controls = if options.media_controls {
            let control_tx = tx.clone();
            MediaControlsHandle::new(move |command| {
                let envelope = Envelope {
                    command: command.into(),
                    reply: None,
                };
                if control_tx.try_send(envelope).is_err() {
                    tracing::warn!(?command, "Dropped media control command");
                }
            })
        } else {
            None
        };

        let service = PlayerService {
            session,
            rx,
            snapshots: snapshots.clone(),
            controls,
            completion_poll: options.completion_poll.max(MIN_COMPLETION_POLL),
        };
        let task = tokio::spawn(service.run());

        (Self { tx, snapshots }, task)
    }

    /// Send a command and wait for the resulting snapshot.
    pub async fn send(&self, command: PlayerCommand) -> Result<PlaybackSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                reply: Some(reply),
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    pub async fn start(&self, song: Song) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Start(song)).await
    }

    pub async fn play(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn toggle(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Toggle).await
    }

    pub async fn next(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Next).await
    }

    pub async fn previous(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Previous).await
    }

    pub async fn stop(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Stop).await
    }

    pub async fn enqueue(&self, song: Song) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Enqueue(song)).await
    }

    pub async fn enqueue_all(&self, songs: Vec<Song>) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::EnqueueAll(songs)).await
    }

    pub async fn set_songs(&self, songs: Vec<Song>) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::SetSongs(songs)).await
    }

    pub async fn interrupt(&self, interruption: Interruption) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Interrupt(interruption)).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Refresh).await
    }

    /// Release the output and end the player task.
    pub async fn shutdown(&self) -> Result<PlaybackSnapshot> {
        self.send(PlayerCommand::Shutdown).await
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackSnapshot> {
        self.snapshots.subscribe()
    }
}

impl From<MediaControlCommand> for PlayerCommand {
    fn from(command: MediaControlCommand) -> Self {
        match command {
            MediaControlCommand::Play => Self::Play,
            MediaControlCommand::Pause => Self::Pause,
            MediaControlCommand::Toggle => Self::Toggle,
            MediaControlCommand::Stop => Self::Stop,
            MediaControlCommand::Next => Self::Next,
            MediaControlCommand::Previous => Self::Previous,
        }
    }
}

struct PlayerService {
    session: PlaybackSession,
    rx: mpsc::Receiver<Envelope>,
    snapshots: broadcast::Sender<PlaybackSnapshot>,
    controls: Option<MediaControlsHandle>,
    completion_poll: Duration,
}

impl PlayerService {
    async fn run(mut self) {
        tracing::info!("Player service started");
        let mut ticker = tokio::time::interval(self.completion_poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                envelope = self.rx.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        break;
                    };
                    let shutdown = matches!(command, PlayerCommand::Shutdown);
                    let result = self.apply(command);
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    } else if let Err(e) = result {
                        tracing::warn!(error = %e, "Player command failed");
                    }
                    if shutdown {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.session.is_finished() {
                        tracing::debug!("Song finished, advancing");
                        if let Err(e) = self.apply(PlayerCommand::Next) {
                            tracing::warn!(error = %e, "Could not advance after song finished");
                            self.session.stop();
                            self.publish();
                        }
                    }
                }
            }
        }

        self.session.stop();
        if let Some(controls) = &self.controls {
            controls.shutdown();
        }
        tracing::info!("Player service stopped");
    }

    fn apply(&mut self, command: PlayerCommand) -> Result<PlaybackSnapshot> {
        tracing::debug!(?command, "Player command");
        let publish = command.is_mutation();

        let outcome = match command {
            PlayerCommand::Start(song) => self.session.start(song),
            PlayerCommand::Play => {
                self.session.play();
                Ok(())
            }
            PlayerCommand::Pause => {
                self.session.pause();
                Ok(())
            }
            PlayerCommand::Toggle => {
                self.session.toggle();
                Ok(())
            }
            PlayerCommand::Next => self.session.next(),
            PlayerCommand::Previous => self.session.previous(),
            PlayerCommand::Stop => {
                self.session.stop();
                Ok(())
            }
            PlayerCommand::Enqueue(song) => {
                self.session.enqueue(song);
                Ok(())
            }
            PlayerCommand::EnqueueAll(songs) => {
                self.session.enqueue_all(songs);
                Ok(())
            }
            PlayerCommand::SetSongs(songs) => {
                self.session.set_songs(songs);
                Ok(())
            }
            PlayerCommand::Interrupt(interruption) => {
                self.session.interrupt(interruption);
                Ok(())
            }
            PlayerCommand::Refresh => Ok(()),
            PlayerCommand::Shutdown => {
                self.session.stop();
                Ok(())
            }
        };

        // A failed open still changes what is loaded
        if publish {
            self.publish();
        }
        outcome.map(|()| self.session.snapshot())
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        if let Some(controls) = &self.controls {
            controls.publish(&snapshot);
        }
        // No subscribers is fine
        let _ = self.snapshots.send(snapshot);
    }
}
