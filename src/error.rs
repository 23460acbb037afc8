//! Application-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Example
//!
//! ```ignore
//! use music_manager::error::{Error, Result};
//!
//! async fn remove(pool: &SqlitePool, song: &Song) -> Result<()> {
//!     std::fs::remove_file(&song.path)?; // IO errors auto-convert
//!     db::delete_song(pool, song.id).await?; // Database errors auto-convert
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata reading error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Audio playback error
    #[error("Playback error: {0}")]
    Playback(String),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Navigation was requested but there are no songs to choose from
    #[error("The song list is empty")]
    EmptyLibrary,

    /// Link rejected before any download was attempted
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// The downloader reported a failure
    #[error("Download failed: {0}")]
    Download(String),

    /// The backing file of a song could not be deleted
    #[error("Could not delete {path}: {source}")]
    FileDeletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The local password gate has no credentials yet
    #[error("No credentials have been configured")]
    AuthNotConfigured,

    /// Location lookup error
    #[error("Location error: {0}")]
    Location(String),

    /// A service task is no longer running
    #[error("Service channel closed")]
    ChannelClosed,
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Create a download error.
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download(message.into())
    }

    /// Create a location error.
    pub fn location(message: impl Into<String>) -> Self {
        Self::Location(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Location(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("/path/to/file.mp3");
        assert!(err.to_string().contains("/path/to/file.mp3"));
    }

    #[test]
    fn test_download_error_message() {
        let err = Error::download("Video unavailable");
        assert_eq!(err.to_string(), "Download failed: Video unavailable");
    }

    #[test]
    fn test_file_deletion_error() {
        let err = Error::FileDeletion {
            path: PathBuf::from("/music/song.mp3"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("song.mp3"));
    }
}
