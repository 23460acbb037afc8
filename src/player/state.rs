//! Player snapshot and command types.

use serde::Serialize;
use std::time::Duration;

use crate::metadata::UNKNOWN_ARTIST;
use crate::model::Song;

/// Title shown when nothing is loaded.
pub const UNKNOWN_SONG: &str = "Unknown Song";

/// Read-only view of the playback session, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub title: String,
    pub artist: String,
    /// Library id of the loaded song
    pub song_id: Option<i64>,
    /// Position of the loaded song in the known song list
    pub index: Option<usize>,
    /// Songs waiting in the play-next queue
    pub queued: usize,
    /// Playback position within the loaded song
    pub position_secs: u64,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            is_playing: false,
            title: UNKNOWN_SONG.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            song_id: None,
            index: None,
            queued: 0,
            position_secs: 0,
        }
    }
}

impl PlaybackSnapshot {
    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let status = if self.is_playing { "Playing" } else { "Paused" };
        format!(
            "[{}] {} - {} ({})",
            status,
            self.artist,
            self.title,
            format_duration(Duration::from_secs(self.position_secs))
        )
    }
}

/// Loss or return of the audio output to another application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Output taken for good
    Lost,
    /// Output taken briefly (a call, a notification)
    Transient,
    /// Output returned
    Regained,
}

/// Commands understood by the player service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Open and play a song (the queue head wins if the queue is non-empty)
    Start(Song),
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Stop,
    /// Append one song to the play-next queue
    Enqueue(Song),
    /// Append several songs to the play-next queue
    EnqueueAll(Vec<Song>),
    /// Replace the known song list
    SetSongs(Vec<Song>),
    Interrupt(Interruption),
    /// Report the current snapshot without changing anything
    Refresh,
    /// Release the output and end the service
    Shutdown,
}

impl PlayerCommand {
    /// Whether the command can change the session.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Refresh | Self::Shutdown)
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1:01:01");
    }

    #[test]
    fn test_default_snapshot_is_unknown() {
        let snapshot = PlaybackSnapshot::default();
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.title, UNKNOWN_SONG);
        assert_eq!(snapshot.artist, UNKNOWN_ARTIST);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let json = serde_json::to_string(&PlaybackSnapshot::default()).unwrap();
        assert!(json.contains("\"is_playing\":false"));
        assert!(json.contains("\"title\":\"Unknown Song\""));
    }

    #[test]
    fn test_summary() {
        let snapshot = PlaybackSnapshot {
            is_playing: true,
            title: "Intro".to_string(),
            artist: "Band".to_string(),
            position_secs: 75,
            ..Default::default()
        };
        assert_eq!(snapshot.summary(), "[Playing] Band - Intro (1:15)");
    }

    #[test]
    fn test_refresh_is_not_a_mutation() {
        assert!(!PlayerCommand::Refresh.is_mutation());
        assert!(PlayerCommand::Next.is_mutation());
    }
}
