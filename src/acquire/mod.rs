//! Adding songs from video links.
//!
//! A link is validated before anything is started. The download then runs
//! in the background while [`acquire`] polls its progress, and a finished
//! download is stored as a new song.

mod downloader;

pub use downloader::{DownloadMessage, Downloader, STATUS_DOWNLOADED, YtDlpDownloader};

#[cfg(test)]
pub use downloader::mocks;

use regex::Regex;
use sqlx::SqlitePool;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::library;
use crate::model::Song;

static LINK_RE: OnceLock<Regex> = OnceLock::new();
static VIDEO_ID_RE: OnceLock<Regex> = OnceLock::new();

fn link_regex() -> &'static Regex {
    LINK_RE.get_or_init(|| {
        let pattern = r"^(http(s)?://)?((w){3}.)?youtu(be|.be)?(\.com)?/.+$";
        Regex::new(pattern).unwrap_or_else(|error| panic!("link regex failed to compile: {error}"))
    })
}

fn video_id_regex() -> &'static Regex {
    VIDEO_ID_RE.get_or_init(|| {
        let pattern = r"^[A-Za-z0-9_-]{11}$";
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("video id regex failed to compile: {error}"))
    })
}

/// Check a user supplied link and return the URL to download.
///
/// A bare 11 character video id is expanded to a full watch URL.
pub fn validate_link(link: &str) -> Result<String> {
    let link = link.trim();
    if video_id_regex().is_match(link) {
        return Ok(format!("https://www.youtube.com/watch?v={}", link));
    }
    if link_regex().is_match(link) {
        Ok(link.to_string())
    } else {
        Err(Error::InvalidLink(link.to_string()))
    }
}

/// Polling behaviour of [`acquire`].
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub poll_interval: Duration,
    /// Give up after this long (None = wait for the downloader)
    pub timeout: Option<Duration>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: None,
        }
    }
}

impl From<&DownloadConfig> for AcquireOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Download `link` and add the result to the library.
///
/// `on_progress` sees every polled progress value.
pub async fn acquire<F>(
    pool: &SqlitePool,
    downloader: &dyn Downloader,
    link: &str,
    options: &AcquireOptions,
    mut on_progress: F,
) -> Result<Song>
where
    F: FnMut(f32) + Send,
{
    let url = validate_link(link)?;
    downloader.download(&url).await?;

    let started = Instant::now();
    loop {
        let progress = downloader.progress();
        on_progress(progress);
        if progress >= 1.0 {
            break;
        }
        if let Some(timeout) = options.timeout
            && started.elapsed() >= timeout
        {
            return Err(Error::download(format!(
                "no result after {}s",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(options.poll_interval).await;
    }

    let message = downloader.message();
    if !message.is_downloaded() {
        return Err(Error::Download(message.status));
    }
    library::add_song(pool, message.into_new_song()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::mocks::MockDownloader;
    use crate::db;
    use crate::test_utils::temp_db;

    fn fast() -> AcquireOptions {
        AcquireOptions {
            poll_interval: Duration::from_millis(1),
            timeout: None,
        }
    }

    #[test]
    fn test_validate_link_accepts_video_links() {
        assert!(validate_link("https://youtu.be/abc123").is_ok());
        assert!(validate_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_link("youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_link("  http://youtu.be/x  ").is_ok());
    }

    #[test]
    fn test_validate_link_rejects_everything_else() {
        assert!(matches!(validate_link("not a url"), Err(Error::InvalidLink(_))));
        assert!(validate_link("https://example.com/video").is_err());
        assert!(validate_link("https://youtu.be/").is_err());
        assert!(validate_link("").is_err());
    }

    #[test]
    fn test_validate_link_expands_bare_id() {
        assert_eq!(
            validate_link("dQw4w9WgXcQ").unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_acquire_adds_downloaded_song() {
        let (pool, _dir) = temp_db().await;
        let downloader = MockDownloader::succeeding("Fresh", "/music/fresh.mp3");
        let mut seen = Vec::new();

        let song = acquire(&pool, &downloader, "https://youtu.be/abc123", &fast(), |p| {
            seen.push(p)
        })
        .await
        .unwrap();

        assert_eq!(song.title, "Fresh");
        assert_eq!(song.duration, 200);
        assert_eq!(seen, vec![0.5, 1.0]);
        let stored = db::find_songs(&pool, "Fresh").await.unwrap();
        assert_eq!(stored, vec![song]);
    }

    #[tokio::test]
    async fn test_acquire_rejects_invalid_link_before_download() {
        let (pool, _dir) = temp_db().await;
        let downloader = MockDownloader::succeeding("Never", "/music/never.mp3");

        let result = acquire(&pool, &downloader, "not a url", &fast(), |_| {}).await;

        assert!(matches!(result, Err(Error::InvalidLink(_))));
        assert!(downloader.requested.lock().is_empty());
        assert!(db::get_all_songs(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_reports_failed_download() {
        let (pool, _dir) = temp_db().await;
        let downloader =
            MockDownloader::new(vec![0.3, 1.0], DownloadMessage::failed("Video unavailable"));

        let result = acquire(&pool, &downloader, "https://youtu.be/abc123", &fast(), |_| {}).await;

        match result {
            Err(Error::Download(status)) => assert_eq!(status, "Video unavailable"),
            other => panic!("expected download error, got {:?}", other),
        }
        assert!(db::get_all_songs(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let (pool, _dir) = temp_db().await;
        let downloader = MockDownloader::new(vec![0.1], DownloadMessage::default());
        let options = AcquireOptions {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(20)),
        };

        let result = acquire(&pool, &downloader, "https://youtu.be/abc123", &options, |_| {}).await;

        assert!(matches!(result, Err(Error::Download(_))));
    }

    #[tokio::test]
    async fn test_acquire_downloads_expanded_id() {
        let (pool, _dir) = temp_db().await;
        let downloader = MockDownloader::succeeding("Id", "/music/id.mp3");

        acquire(&pool, &downloader, "dQw4w9WgXcQ", &fast(), |_| {}).await.unwrap();

        assert_eq!(
            downloader.requested.lock().as_slice(),
            ["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()]
        );
    }
}
