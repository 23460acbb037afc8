//! Song library operations that touch both the database and the filesystem.

use crate::error::{Error, Result};
use crate::model::{NewSong, Song};
use crate::{db, metadata, scanner};
use futures::{Stream, StreamExt};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub enum ImportEvent {
    Added(Song),
    Error(PathBuf, String),
}

/// Store a new song and return the stored row.
pub async fn add_song(pool: &SqlitePool, song: NewSong) -> Result<Song> {
    let id = db::insert_song(pool, &song).await?;
    tracing::info!(id, title = %song.title, artist = %song.artist, "Song added");
    Ok(Song {
        id,
        title: song.title,
        artist: song.artist,
        duration: song.duration,
        path: song.path,
    })
}

/// Add a local audio file, reading its tags for title, artist and duration.
pub async fn add_local_file(pool: &SqlitePool, path: &Path) -> Result<Song> {
    if !path.is_file() {
        return Err(Error::not_found(path));
    }
    let owned = path.to_path_buf();
    let meta = tokio::task::spawn_blocking(move || metadata::read(&owned))
        .await
        .map_err(|e| Error::metadata(path, e.to_string()))??;
    add_song(pool, meta.into_new_song(path)).await
}

/// Imports every audio file under `root`.
/// Returns a stream of ImportEvents.
pub fn import_directory(pool: SqlitePool, root: PathBuf) -> impl Stream<Item = ImportEvent> {
    scanner::scan(root)
        .map(move |path| {
            let pool = pool.clone();
            async move {
                match add_local_file(&pool, &path).await {
                    Ok(song) => ImportEvent::Added(song),
                    Err(e) => ImportEvent::Error(path, e.to_string()),
                }
            }
        })
        .buffer_unordered(4)
}

/// Remove a song together with its backing file.
///
/// The file is deleted first. If that fails the row is kept and
/// [`Error::FileDeletion`] is returned. Album links go with the row.
pub async fn remove_song(pool: &SqlitePool, song: &Song) -> Result<()> {
    let path = song.path_buf();
    if let Err(source) = tokio::fs::remove_file(&path).await {
        tracing::warn!(id = song.id, path = %path.display(), error = %source, "Error deleting song");
        return Err(Error::FileDeletion { path, source });
    }
    db::delete_song(pool, song.id).await?;
    tracing::info!(id = song.id, title = %song.title, "Song deleted");
    Ok(())
}
