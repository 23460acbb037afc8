//! Database module for song, album, and singleton-row persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Song CRUD and search
//! - Albums and the song/album association
//! - The `step_count` and `auth_data` singleton rows
//!
//! # Example
//!
//! ```ignore
//! use music_manager::db::{init_db, get_all_songs};
//!
//! let pool = init_db("sqlite:music.db").await?;
//! let songs = get_all_songs(&pool).await?;
//! ```

use std::str::FromStr;

use crate::model::{Album, AuthData, NewSong, SINGLETON_ID, Song, SongAlbum, StepCount};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "music_manager.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, enables foreign keys so
/// association rows cascade, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - The URL is malformed
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

// ============================================================================
// Songs
// ============================================================================

/// Insert a new song and return its ID.
pub async fn insert_song(pool: &SqlitePool, song: &NewSong) -> sqlx::Result<i64> {
    let result =
        sqlx::query("INSERT INTO Songs (title, artist, duration, path) VALUES (?, ?, ?, ?)")
            .bind(&song.title)
            .bind(&song.artist)
            .bind(song.duration)
            .bind(&song.path)
            .execute(pool)
            .await?;
    Ok(result.last_insert_rowid())
}

/// Get all songs ordered by insertion.
pub async fn get_all_songs(pool: &SqlitePool) -> sqlx::Result<Vec<Song>> {
    sqlx::query_as::<_, Song>("SELECT id, title, artist, duration, path FROM Songs ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Get a song by its database ID.
pub async fn get_song_by_id(pool: &SqlitePool, song_id: i64) -> sqlx::Result<Option<Song>> {
    sqlx::query_as::<_, Song>("SELECT id, title, artist, duration, path FROM Songs WHERE id = ?")
        .bind(song_id)
        .fetch_optional(pool)
        .await
}

/// Find songs whose title or artist equals `query` exactly.
pub async fn find_songs(pool: &SqlitePool, query: &str) -> sqlx::Result<Vec<Song>> {
    sqlx::query_as::<_, Song>(
        "SELECT DISTINCT id, title, artist, duration, path FROM Songs WHERE title = ? OR artist = ? ORDER BY id",
    )
    .bind(query)
    .bind(query)
    .fetch_all(pool)
    .await
}

/// Update all fields of an existing song.
pub async fn update_song(pool: &SqlitePool, song: &Song) -> sqlx::Result<bool> {
    let result =
        sqlx::query("UPDATE Songs SET title = ?, artist = ?, duration = ?, path = ? WHERE id = ?")
            .bind(&song.title)
            .bind(&song.artist)
            .bind(song.duration)
            .bind(&song.path)
            .bind(song.id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a song row. Album links are removed by the foreign key cascade.
///
/// Returns `false` if no song had this ID.
pub async fn delete_song(pool: &SqlitePool, song_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM Songs WHERE id = ?")
        .bind(song_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Albums
// ============================================================================

/// Create an album and return its ID.
pub async fn insert_album(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO Albums (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Rename an album.
pub async fn update_album(pool: &SqlitePool, album: &Album) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE Albums SET name = ? WHERE id = ?")
        .bind(&album.name)
        .bind(album.id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete an album. Its song links cascade; the songs themselves stay.
pub async fn delete_album(pool: &SqlitePool, album_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM Albums WHERE id = ?")
        .bind(album_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Get all albums.
pub async fn get_all_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>("SELECT id, name FROM Albums ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Get albums with an exact name.
pub async fn get_albums_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>("SELECT id, name FROM Albums WHERE name = ? ORDER BY id")
        .bind(name)
        .fetch_all(pool)
        .await
}

/// Link a song to an album. Linking twice is a no-op.
pub async fn add_song_to_album(pool: &SqlitePool, song_id: i64, album_id: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT OR REPLACE INTO SongAlbumCrossRef (song_id, album_id) VALUES (?, ?)")
        .bind(song_id)
        .bind(album_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Unlink a song from an album.
pub async fn remove_song_from_album(
    pool: &SqlitePool,
    song_id: i64,
    album_id: i64,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM SongAlbumCrossRef WHERE song_id = ? AND album_id = ?")
        .bind(song_id)
        .bind(album_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Get every song/album link.
pub async fn get_all_song_albums(pool: &SqlitePool) -> sqlx::Result<Vec<SongAlbum>> {
    sqlx::query_as::<_, SongAlbum>("SELECT song_id, album_id FROM SongAlbumCrossRef")
        .fetch_all(pool)
        .await
}

/// Get the songs of an album.
pub async fn get_songs_of_album(pool: &SqlitePool, album_id: i64) -> sqlx::Result<Vec<Song>> {
    sqlx::query_as::<_, Song>(
        r#"
        SELECT s.id, s.title, s.artist, s.duration, s.path
        FROM Songs s
        INNER JOIN SongAlbumCrossRef x ON s.id = x.song_id
        WHERE x.album_id = ?
        ORDER BY s.id
        "#,
    )
    .bind(album_id)
    .fetch_all(pool)
    .await
}

// ============================================================================
// Singleton rows
// ============================================================================

/// Read the step count row.
pub async fn get_step_count(pool: &SqlitePool) -> sqlx::Result<Option<StepCount>> {
    sqlx::query_as::<_, StepCount>("SELECT id, total_steps FROM step_count WHERE id = ?")
        .bind(SINGLETON_ID)
        .fetch_optional(pool)
        .await
}

/// Write the step total, creating the row if it is missing.
pub async fn set_step_count(pool: &SqlitePool, total_steps: i64) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO step_count (id, total_steps) VALUES (?, ?)
        ON CONFLICT(id) DO UPDATE SET total_steps = excluded.total_steps
        "#,
    )
    .bind(SINGLETON_ID)
    .bind(total_steps)
    .execute(pool)
    .await?;
    Ok(())
}

/// Read the credentials row.
pub async fn get_auth_data(pool: &SqlitePool) -> sqlx::Result<Option<AuthData>> {
    sqlx::query_as::<_, AuthData>(
        "SELECT id, password, recovery_email FROM auth_data WHERE id = ?",
    )
    .bind(SINGLETON_ID)
    .fetch_optional(pool)
    .await
}

/// Insert or replace the credentials row.
pub async fn upsert_auth_data(
    pool: &SqlitePool,
    password_hash: &str,
    recovery_email: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO auth_data (id, password, recovery_email) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            password = excluded.password,
            recovery_email = excluded.recovery_email
        "#,
    )
    .bind(SINGLETON_ID)
    .bind(password_hash)
    .bind(recovery_email)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update the existing credentials row. Returns `false` if there is none.
pub async fn update_auth_data(
    pool: &SqlitePool,
    password_hash: &str,
    recovery_email: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE auth_data SET password = ?, recovery_email = ? WHERE id = ?")
        .bind(password_hash)
        .bind(recovery_email)
        .bind(SINGLETON_ID)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
