//! Audio file metadata reading.
//!
//! Uses the lofty crate for format-independent tag access so that local
//! files can be added to the library with a title, artist and duration.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::NewSong;

/// Fallback artist when a file carries no artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Tags read from an audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    /// Duration in whole seconds
    pub duration: u64,
}

impl SongMetadata {
    /// Build a library row for the file these tags came from.
    pub fn into_new_song(self, path: &Path) -> NewSong {
        NewSong {
            title: self.title,
            artist: self.artist,
            duration: self.duration as i64,
            path: path.to_string_lossy().into_owned(),
        }
    }
}

/// Read title, artist and duration from an audio file.
///
/// A missing title falls back to the file stem, a missing artist to
/// [`UNKNOWN_ARTIST`].
pub fn read(path: &Path) -> Result<SongMetadata> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file: {}", e)))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read tags: {}", e)))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| file_stem(path));

    let artist = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    let duration = tagged_file.properties().duration().as_secs();

    Ok(SongMetadata {
        title,
        artist,
        duration,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
