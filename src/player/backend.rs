//! Seam between the playback session and the audio output.
//!
//! The session only ever needs to open a file and drive the resulting
//! handle. [`crate::player::AudioEngine`] implements this with symphonia and
//! cpal; tests use the recording mocks below.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Opens songs for playback.
pub trait MediaBackend: Send {
    /// Prepare a file for playback. The returned handle starts paused.
    fn open(&mut self, path: &Path) -> Result<Box<dyn MediaHandle>>;
}

/// One opened song.
pub trait MediaHandle: Send {
    fn start(&mut self);
    fn pause(&mut self);
    /// Release the underlying resource. The handle is dead afterwards.
    fn stop(&mut self);
    /// True once the end of the song has been played out.
    fn is_finished(&self) -> bool;
    fn position(&self) -> Duration;
}
