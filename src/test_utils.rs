//! Test utilities and fixtures for music-manager tests.
//!
//! This module provides common test helpers, mock factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use music_manager::test_utils::{temp_db, mock_new_song};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let song = mock_new_song("Title", "/music/title.mp3");
//!     // ... test logic
//! }
//! ```

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::model::{NewSong, Song};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a NewSong by "Test Artist" lasting three minutes.
pub fn mock_new_song(title: &str, path: &str) -> NewSong {
    NewSong {
        title: title.to_string(),
        artist: "Test Artist".to_string(),
        duration: 180,
        path: path.to_string(),
    }
}

/// Creates a stored-looking Song with the given ID.
///
/// The path is `/test/song{id}.mp3`, which does not exist on disk.
pub fn mock_song(id: i64) -> Song {
    Song {
        id,
        title: format!("Song {}", id),
        artist: "Test Artist".to_string(),
        duration: 180,
        path: format!("/test/song{}.mp3", id),
    }
}

/// Creates `count` songs with IDs starting at 1.
pub fn mock_songs(count: i64) -> Vec<Song> {
    (1..=count).map(mock_song).collect()
}

/// Inserts a mock song into the database and returns its ID.
pub async fn insert_mock_song(pool: &SqlitePool, path: &str) -> i64 {
    crate::db::insert_song(pool, &mock_new_song("Test Song", path))
        .await
        .expect("Failed to insert song")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let songs = crate::db::get_all_songs(&pool).await.unwrap();
        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_insert_mock_song() {
        let (pool, _dir) = temp_db().await;

        let id = insert_mock_song(&pool, "/test/song.mp3").await;
        assert!(id > 0);

        let songs = crate::db::get_all_songs(&pool).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].path, "/test/song.mp3");
    }

    #[test]
    fn test_mock_songs_are_distinct() {
        let songs = mock_songs(3);
        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].id, 1);
        assert_ne!(songs[0], songs[1]);
        assert_eq!(songs[2].path, "/test/song3.mp3");
    }
}
