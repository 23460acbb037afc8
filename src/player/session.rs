//! Playback session: the single owner of what is playing.
//!
//! The session is plain synchronous state. The player service owns one
//! instance and applies commands to it in arrival order, so no locking is
//! needed here.

use rand::Rng;
use std::collections::VecDeque;

use super::backend::{MediaBackend, MediaHandle};
use super::state::{Interruption, PlaybackSnapshot};
use crate::config::PreviousFallback;
use crate::error::{Error, Result};
use crate::model::Song;

pub struct PlaybackSession {
    songs: Vec<Song>,
    index: Option<usize>,
    current: Option<Song>,
    playing: bool,
    /// Play-next queue (FIFO)
    queue: VecDeque<Song>,
    /// Recently played (LIFO)
    history: Vec<Song>,
    fallback: PreviousFallback,
    backend: Box<dyn MediaBackend>,
    resource: Option<Box<dyn MediaHandle>>,
}

impl PlaybackSession {
    pub fn new(backend: Box<dyn MediaBackend>, fallback: PreviousFallback) -> Self {
        Self {
            songs: Vec::new(),
            index: None,
            current: None,
            playing: false,
            queue: VecDeque::new(),
            history: Vec::new(),
            fallback,
            backend,
            resource: None,
        }
    }

    /// Replace the known song list. The index follows the current song.
    pub fn set_songs(&mut self, songs: Vec<Song>) {
        self.songs = songs;
        self.index = self.current.as_ref().and_then(|c| self.position_of(c));
    }

    pub fn enqueue(&mut self, song: Song) {
        self.queue.push_back(song);
    }

    pub fn enqueue_all(&mut self, songs: impl IntoIterator<Item = Song>) {
        self.queue.extend(songs);
    }

    /// Play `song`, or the head of the play-next queue if there is one.
    pub fn start(&mut self, song: Song) -> Result<()> {
        let song = self.queue.pop_front().unwrap_or(song);
        self.push_history();
        let index = self.position_of(&song);
        self.open_and_play(song, index)
    }

    /// Resume. Without an open resource only the flag changes.
    pub fn play(&mut self) {
        if let Some(resource) = self.resource.as_mut() {
            resource.start();
        }
        self.playing = true;
    }

    /// Pause. Without an open resource only the flag changes.
    pub fn pause(&mut self) {
        if let Some(resource) = self.resource.as_mut() {
            resource.pause();
        }
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advance circularly through the song list.
    pub fn next(&mut self) -> Result<()> {
        if self.songs.is_empty() {
            return Err(Error::EmptyLibrary);
        }
        let index = self.index.map_or(0, |i| (i + 1) % self.songs.len());
        let song = self.songs[index].clone();
        self.push_history();
        self.open_and_play(song, Some(index))
    }

    /// Return to the most recently played song.
    ///
    /// With an empty history the configured [`PreviousFallback`] decides.
    pub fn previous(&mut self) -> Result<()> {
        if let Some(song) = self.history.pop() {
            let index = self.position_of(&song);
            return self.open_and_play(song, index);
        }

        if self.fallback == PreviousFallback::Restart
            && let Some(song) = self.current.clone()
        {
            let index = self.index;
            return self.open_and_play(song, index);
        }

        if self.songs.is_empty() {
            return Err(Error::EmptyLibrary);
        }
        let index = rand::rng().random_range(0..self.songs.len());
        let song = self.songs[index].clone();
        self.open_and_play(song, Some(index))
    }

    /// Release the resource and stop playing.
    pub fn stop(&mut self) {
        self.release();
        self.playing = false;
    }

    /// Apply an output interruption. Losing the output pauses, regaining it plays.
    pub fn interrupt(&mut self, interruption: Interruption) {
        match interruption {
            Interruption::Lost | Interruption::Transient => self.pause(),
            Interruption::Regained => self.play(),
        }
    }

    /// Whether the open resource has played to the end.
    pub fn is_finished(&self) -> bool {
        self.resource.as_ref().is_some_and(|r| r.is_finished())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        match (self.resource.as_ref(), self.current.as_ref()) {
            (Some(resource), Some(song)) => PlaybackSnapshot {
                is_playing: self.playing,
                title: song.title.clone(),
                artist: song.artist.clone(),
                song_id: Some(song.id),
                index: self.index,
                queued: self.queue.len(),
                position_secs: resource.position().as_secs(),
            },
            _ => PlaybackSnapshot {
                is_playing: self.playing,
                queued: self.queue.len(),
                ..PlaybackSnapshot::default()
            },
        }
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self) {
        if let Some(song) = self.current.take() {
            self.history.push(song);
        }
    }

    fn position_of(&self, song: &Song) -> Option<usize> {
        self.songs.iter().position(|s| s.id == song.id)
    }

    fn release(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.stop();
        }
    }

    fn open_and_play(&mut self, song: Song, index: Option<usize>) -> Result<()> {
        self.release();
        self.index = index;

        let opened = self.backend.open(&song.path_buf());
        self.current = Some(song);
        match opened {
            Ok(mut resource) => {
                resource.start();
                self.resource = Some(resource);
                self.playing = true;
                Ok(())
            }
            Err(e) => {
                self.playing = false;
                Err(e)
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::backend::mocks::{MockBackend, MockEvent};
    use crate::test_utils::{mock_song, mock_songs};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn session_with(count: i64) -> (PlaybackSession, MockBackend) {
        let backend = MockBackend::new();
        let mut session = PlaybackSession::new(Box::new(backend.clone()), PreviousFallback::Random);
        session.set_songs(mock_songs(count));
        (session, backend)
    }

    #[test]
    fn test_start_plays_song() {
        let (mut session, backend) = session_with(3);

        session.start(mock_song(2)).unwrap();

        assert!(session.is_playing());
        assert_eq!(session.index(), Some(1));
        assert_eq!(session.current().map(|s| s.id), Some(2));
        assert_eq!(
            backend.events(),
            vec![
                MockEvent::Open(PathBuf::from("/test/song2.mp3")),
                MockEvent::Start(PathBuf::from("/test/song2.mp3")),
            ]
        );
    }

    #[test]
    fn test_start_prefers_queue_head() {
        let (mut session, _backend) = session_with(3);
        session.enqueue(mock_song(3));

        session.start(mock_song(1)).unwrap();

        assert_eq!(session.current().map(|s| s.id), Some(3));
        assert_eq!(session.queue_len(), 0);
    }

    #[test]
    fn test_queue_is_fifo() {
        let (mut session, _backend) = session_with(4);
        session.enqueue_all(vec![mock_song(4), mock_song(2)]);

        session.start(mock_song(1)).unwrap();
        assert_eq!(session.current().map(|s| s.id), Some(4));
        session.start(mock_song(1)).unwrap();
        assert_eq!(session.current().map(|s| s.id), Some(2));
        session.start(mock_song(1)).unwrap();
        assert_eq!(session.current().map(|s| s.id), Some(1));
    }

    #[test]
    fn test_start_releases_previous_resource() {
        let (mut session, backend) = session_with(2);

        session.start(mock_song(1)).unwrap();
        session.start(mock_song(2)).unwrap();

        assert!(
            backend
                .events()
                .contains(&MockEvent::Stop(PathBuf::from("/test/song1.mp3")))
        );
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_start_with_unknown_song_has_no_index() {
        let (mut session, _backend) = session_with(2);

        session.start(mock_song(99)).unwrap();

        assert_eq!(session.index(), None);
        assert!(session.is_playing());
    }

    #[test]
    fn test_start_failure_leaves_session_stopped() {
        let (mut session, backend) = session_with(2);
        session.start(mock_song(1)).unwrap();
        backend.fail_on("/test/song2.mp3");

        let result = session.start(mock_song(2));

        assert!(matches!(result, Err(Error::Playback(_))));
        assert!(!session.is_playing());
        assert!(!session.is_finished());
        assert_eq!(session.snapshot().title, "Unknown Song");
    }

    #[test]
    fn test_next_wraps_around() {
        let (mut session, _backend) = session_with(3);
        session.start(mock_song(3)).unwrap();

        session.next().unwrap();

        assert_eq!(session.index(), Some(0));
        assert_eq!(session.current().map(|s| s.id), Some(1));
    }

    #[test]
    fn test_next_without_index_starts_at_zero() {
        let (mut session, _backend) = session_with(3);

        session.next().unwrap();

        assert_eq!(session.index(), Some(0));
    }

    #[test]
    fn test_next_on_empty_list() {
        let (mut session, _backend) = session_with(0);

        assert!(matches!(session.next(), Err(Error::EmptyLibrary)));
        assert!(!session.is_playing());
    }

    #[test]
    fn test_previous_restores_prior_song() {
        let (mut session, _backend) = session_with(3);
        session.start(mock_song(1)).unwrap();
        session.start(mock_song(3)).unwrap();

        session.previous().unwrap();

        assert_eq!(session.current().map(|s| s.id), Some(1));
        assert_eq!(session.index(), Some(0));
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn test_previous_random_fallback_stays_in_list() {
        let (mut session, _backend) = session_with(5);

        session.previous().unwrap();

        let index = session.index().unwrap();
        assert!(index < 5);
        assert_eq!(session.current(), Some(&session.songs()[index]));
    }

    #[test]
    fn test_previous_restart_fallback_reopens_current() {
        let backend = MockBackend::new();
        let mut session =
            PlaybackSession::new(Box::new(backend.clone()), PreviousFallback::Restart);
        session.set_songs(mock_songs(3));
        session.next().unwrap();
        session.history.clear();

        session.previous().unwrap();

        assert_eq!(session.current().map(|s| s.id), Some(1));
        assert_eq!(backend.opened().len(), 2);
    }

    #[test]
    fn test_previous_on_empty_list() {
        let (mut session, _backend) = session_with(0);

        assert!(matches!(session.previous(), Err(Error::EmptyLibrary)));
    }

    #[test]
    fn test_play_pause_without_resource_only_flips_flag() {
        let (mut session, backend) = session_with(1);

        session.play();
        assert!(session.is_playing());
        session.pause();
        assert!(!session.is_playing());
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_toggle() {
        let (mut session, backend) = session_with(1);
        session.start(mock_song(1)).unwrap();

        session.toggle();
        assert!(!session.is_playing());
        session.toggle();
        assert!(session.is_playing());
        assert!(
            backend
                .events()
                .contains(&MockEvent::Pause(PathBuf::from("/test/song1.mp3")))
        );
    }

    #[test]
    fn test_stop_publishes_unknown_song() {
        let (mut session, backend) = session_with(1);
        session.start(mock_song(1)).unwrap();

        session.stop();

        let snapshot = session.snapshot();
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.title, "Unknown Song");
        assert_eq!(snapshot.artist, "Unknown Artist");
        assert_eq!(snapshot.song_id, None);
        assert!(
            backend
                .events()
                .contains(&MockEvent::Stop(PathBuf::from("/test/song1.mp3")))
        );
    }

    #[test]
    fn test_interruptions_last_one_wins() {
        let (mut session, _backend) = session_with(1);
        session.start(mock_song(1)).unwrap();

        session.interrupt(Interruption::Transient);
        assert!(!session.is_playing());
        session.interrupt(Interruption::Regained);
        assert!(session.is_playing());
        session.interrupt(Interruption::Lost);
        assert!(!session.is_playing());
    }

    #[test]
    fn test_finished_resource() {
        let (mut session, backend) = session_with(2);
        session.start(mock_song(1)).unwrap();
        assert!(!session.is_finished());

        backend.finish_current();
        assert!(session.is_finished());

        session.next().unwrap();
        assert!(!session.is_finished());
        assert_eq!(session.current().map(|s| s.id), Some(2));
    }

    #[test]
    fn test_set_songs_rederives_index() {
        let (mut session, _backend) = session_with(3);
        session.start(mock_song(2)).unwrap();

        session.set_songs(vec![mock_song(5), mock_song(2)]);
        assert_eq!(session.index(), Some(1));

        session.set_songs(vec![mock_song(5)]);
        assert_eq!(session.index(), None);
    }

    #[test]
    fn test_snapshot_describes_current_song() {
        let (mut session, _backend) = session_with(2);
        session.enqueue(mock_song(2));
        session.enqueue(mock_song(1));
        session.start(mock_song(1)).unwrap();

        let snapshot = session.snapshot();
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.title, "Song 2");
        assert_eq!(snapshot.artist, "Test Artist");
        assert_eq!(snapshot.song_id, Some(2));
        assert_eq!(snapshot.queued, 1);
    }

    proptest! {
        #[test]
        fn prop_next_cycles_back_to_start(count in 1i64..20, start in 0i64..20) {
            let (mut session, _backend) = session_with(count);
            let start_id = (start % count) + 1;
            session.start(mock_song(start_id)).unwrap();
            let original = session.index();

            for _ in 0..count {
                session.next().unwrap();
            }

            prop_assert_eq!(session.index(), original);
            prop_assert_eq!(session.current().map(|s| s.id), Some(start_id));
        }

        #[test]
        fn prop_previous_undoes_start(count in 2i64..10, first in 0i64..10, second in 0i64..10) {
            let (mut session, _backend) = session_with(count);
            let first_id = (first % count) + 1;
            let second_id = (second % count) + 1;
            session.start(mock_song(first_id)).unwrap();
            session.start(mock_song(second_id)).unwrap();

            session.previous().unwrap();

            prop_assert_eq!(session.current().map(|s| s.id), Some(first_id));
        }
    }
}
