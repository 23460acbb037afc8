//! Core data models for the music library.
//!
//! Defines the persisted entities: [`Song`], [`Album`], [`SongAlbum`],
//! [`StepCount`] and [`AuthData`]. These derive `FromRow` for SQLx mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `Songs` - Audio files with title, artist, duration and path
//! - `Albums` - User-created albums
//! - `SongAlbumCrossRef` - Song/album association, cascades on delete
//! - `step_count` - Singleton running step total (id = 1)
//! - `auth_data` - Singleton local credentials (id = 1)

use serde::Serialize;
use sqlx::FromRow;
use std::path::PathBuf;

/// Fixed primary key of the singleton rows.
pub const SINGLETON_ID: i64 = 1;

/// A song in the library.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Song {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Song title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Duration in seconds
    pub duration: i64,
    /// Absolute path of the backing file
    pub path: String,
}

impl Song {
    /// Convert the path string to a PathBuf.
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

/// A song that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub duration: i64,
    pub path: String,
}

/// A user-created album.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Album name
    pub name: String,
}

/// Association between a song and an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct SongAlbum {
    pub song_id: i64,
    pub album_id: i64,
}

/// The running step total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct StepCount {
    pub id: i64,
    pub total_steps: i64,
}

/// Local password gate credentials.
///
/// `password` holds a SHA-256 hex digest, never the plain password.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AuthData {
    pub id: i64,
    pub password: String,
    pub recovery_email: String,
}
