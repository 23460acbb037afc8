//! OS media controls integration via souvlaki.
//!
//! - Linux: MPRIS D-Bus interface
//! - macOS: MediaCenter / Now Playing
//! - Windows: SMTC needs a window handle, which a terminal app does not own,
//!   so initialization fails there and playback continues without controls.
//!
//! Media keys and headset buttons arrive as [`MediaControlCommand`]s and are
//! handed to a callback; the player service turns them into commands.

use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use std::sync::mpsc::{Receiver, Sender, channel};

use super::state::PlaybackSnapshot;

/// Commands that can be received from OS media controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaControlCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Previous,
}

impl MediaControlCommand {
    /// Map a souvlaki event. Seeking, volume and window events are not handled.
    pub fn from_event(event: &MediaControlEvent) -> Option<Self> {
        match event {
            MediaControlEvent::Play => Some(Self::Play),
            MediaControlEvent::Pause => Some(Self::Pause),
            MediaControlEvent::Toggle => Some(Self::Toggle),
            MediaControlEvent::Stop => Some(Self::Stop),
            MediaControlEvent::Next => Some(Self::Next),
            MediaControlEvent::Previous => Some(Self::Previous),
            _ => None,
        }
    }
}

/// Playback state for media controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Updates that can be sent to the media controls.
#[derive(Debug, Clone)]
enum MediaControlsUpdate {
    Metadata { title: String, artist: String },
    PlaybackState(MediaPlaybackState),
    Shutdown,
}

/// Handle to the OS media controls.
///
/// The controls run on a separate thread and communicate via channels.
pub struct MediaControlsHandle {
    update_tx: Sender<MediaControlsUpdate>,
}

impl MediaControlsHandle {
    /// Start the media controls thread.
    ///
    /// Returns `None` if the thread cannot be spawned. Platform failures
    /// after that are logged from the thread.
    pub fn new<F>(on_command: F) -> Option<Self>
    where
        F: Fn(MediaControlCommand) + Send + 'static,
    {
        let (update_tx, update_rx) = channel::<MediaControlsUpdate>();

        match std::thread::Builder::new()
            .name("media-controls".into())
            .spawn(move || match run_media_controls(update_rx, on_command) {
                Ok(()) => tracing::debug!("Media controls thread ended"),
                Err(e) => tracing::warn!("Media controls unavailable: {}", e),
            }) {
            Ok(_) => Some(Self { update_tx }),
            Err(e) => {
                tracing::error!("Failed to spawn media controls thread: {}", e);
                None
            }
        }
    }

    /// Mirror a player snapshot into the now-playing display.
    pub fn publish(&self, snapshot: &PlaybackSnapshot) {
        let state = match (snapshot.song_id, snapshot.is_playing) {
            (None, _) => MediaPlaybackState::Stopped,
            (Some(_), true) => MediaPlaybackState::Playing,
            (Some(_), false) => MediaPlaybackState::Paused,
        };
        let _ = self.update_tx.send(MediaControlsUpdate::Metadata {
            title: snapshot.title.clone(),
            artist: snapshot.artist.clone(),
        });
        let _ = self.update_tx.send(MediaControlsUpdate::PlaybackState(state));
    }

    pub fn shutdown(&self) {
        let _ = self.update_tx.send(MediaControlsUpdate::Shutdown);
    }
}

impl Drop for MediaControlsHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_media_controls<F>(update_rx: Receiver<MediaControlsUpdate>, on_command: F) -> Result<(), String>
where
    F: Fn(MediaControlCommand) + Send + 'static,
{
    let config = PlatformConfig {
        dbus_name: "music_manager",
        display_name: "Music Manager",
        hwnd: None,
    };

    let mut controls =
        MediaControls::new(config).map_err(|e| format!("Failed to create media controls: {:?}", e))?;

    controls
        .attach(move |event: MediaControlEvent| {
            tracing::debug!("Media control event: {:?}", event);
            if let Some(command) = MediaControlCommand::from_event(&event) {
                on_command(command);
            }
        })
        .map_err(|e| format!("Failed to attach event handler: {:?}", e))?;

    controls
        .set_playback(MediaPlayback::Stopped)
        .map_err(|e| format!("Failed to set playback state: {:?}", e))?;

    tracing::info!("Media controls initialized");

    while let Ok(update) = update_rx.recv() {
        match update {
            MediaControlsUpdate::Metadata { title, artist } => {
                let metadata = MediaMetadata {
                    title: Some(&title),
                    artist: Some(&artist),
                    ..Default::default()
                };
                if let Err(e) = controls.set_metadata(metadata) {
                    tracing::debug!("Failed to set media metadata: {:?}", e);
                }
            }
            MediaControlsUpdate::PlaybackState(state) => {
                let playback = match state {
                    MediaPlaybackState::Playing => MediaPlayback::Playing { progress: None },
                    MediaPlaybackState::Paused => MediaPlayback::Paused { progress: None },
                    MediaPlaybackState::Stopped => MediaPlayback::Stopped,
                };
                if let Err(e) = controls.set_playback(playback) {
                    tracing::debug!("Failed to set playback state: {:?}", e);
                }
            }
            MediaControlsUpdate::Shutdown => break,
        }
    }

    Ok(())
}
