//! Downloader backends.
//!
//! The shipped backend shells out to `yt-dlp`, which must be installed:
//! - Windows: `winget install yt-dlp`
//! - macOS: `brew install yt-dlp`
//! - Linux: `pipx install yt-dlp` or the distribution package

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::{Error, Result};
use crate::metadata::UNKNOWN_ARTIST;
use crate::model::NewSong;

/// Status reported by a finished, successful download.
pub const STATUS_DOWNLOADED: &str = "Downloaded";

const PROGRESS_PREFIX: &str = "progress:";
const RESULT_PREFIX: &str = "result\t";

/// Outcome of a download as reported by the downloader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadMessage {
    /// [`STATUS_DOWNLOADED`] on success, an error description otherwise
    pub status: String,
    pub title: String,
    pub artist: String,
    /// Seconds
    pub duration: i64,
    pub path: String,
}

impl DownloadMessage {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: reason.into(),
            ..Default::default()
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.status == STATUS_DOWNLOADED
    }

    pub fn into_new_song(self) -> NewSong {
        NewSong {
            title: self.title,
            artist: self.artist,
            duration: self.duration,
            path: self.path,
        }
    }
}

/// Fetches audio for a link in the background.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Start downloading `url`. Returns once the download is under way.
    async fn download(&self, url: &str) -> Result<()>;

    /// Fraction done in `[0, 1]`. Reaches 1.0 only once [`Self::message`] is final.
    fn progress(&self) -> f32;

    /// Result of the last finished download.
    fn message(&self) -> DownloadMessage;
}

#[derive(Debug, Default)]
struct DownloadState {
    progress: f32,
    message: DownloadMessage,
}

/// Runs `yt-dlp` as a subprocess, extracting audio into `output_dir`.
pub struct YtDlpDownloader {
    tool: String,
    output_dir: PathBuf,
    state: Arc<Mutex<DownloadState>>,
}

impl YtDlpDownloader {
    pub fn new(tool: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            output_dir: output_dir.into(),
            state: Arc::new(Mutex::new(DownloadState::default())),
        }
    }

    fn args(&self, url: &str) -> Vec<String> {
        let template = self.output_dir.join("%(title)s [%(id)s].%(ext)s");
        vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-colors".to_string(),
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--progress-template".to_string(),
            format!("download:{}%(progress._percent_str)s", PROGRESS_PREFIX),
            "--print".to_string(),
            // JSON keeps tabs and quotes in titles from shifting fields
            format!(
                "after_move:{}%(.{{title,uploader,duration,filepath}})j",
                RESULT_PREFIX
            ),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, url: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        *self.state.lock() = DownloadState::default();

        let mut child = Command::new(&self.tool)
            .args(self.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::download(format!("failed to run {}: {}", self.tool, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::download("downloader stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::download("downloader stderr unavailable"))?;

        tracing::info!(tool = %self.tool, url, "Download started");
        tokio::spawn(watch_process(child, stdout, stderr, Arc::clone(&self.state)));
        Ok(())
    }

    fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    fn message(&self) -> DownloadMessage {
        self.state.lock().message.clone()
    }
}

async fn watch_process(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    state: Arc<Mutex<DownloadState>>,
) {
    // Keep the last stderr line as the failure reason
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut last = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.trim().is_empty() {
                last = line;
            }
        }
        last
    });

    let mut result = None;
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(progress) = parse_progress(&line) {
                    // 1.0 is reserved for "message is final"
                    state.lock().progress = progress.min(0.99);
                } else if let Some(message) = parse_result(&line) {
                    result = Some(message);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read downloader output");
                break;
            }
        }
    }

    let exit = child.wait().await;
    let last_error = stderr_task.await.unwrap_or_default();

    let message = match (exit, result) {
        (Ok(status), Some(message)) if status.success() => message,
        (Ok(status), _) if last_error.is_empty() => {
            DownloadMessage::failed(format!("downloader exited with {}", status))
        }
        (Ok(_), _) => DownloadMessage::failed(last_error),
        (Err(e), _) => DownloadMessage::failed(e.to_string()),
    };

    if message.is_downloaded() {
        tracing::info!(title = %message.title, path = %message.path, "Download finished");
    } else {
        tracing::warn!(status = %message.status, "Download failed");
    }

    let mut s = state.lock();
    s.message = message;
    s.progress = 1.0;
}

/// Parse a `progress: 42.0%` line into a fraction.
fn parse_progress(line: &str) -> Option<f32> {
    let percent = line
        .trim()
        .strip_prefix(PROGRESS_PREFIX)?
        .trim()
        .trim_end_matches('%')
        .parse::<f32>()
        .ok()?;
    Some((percent / 100.0).clamp(0.0, 1.0))
}

/// Fields printed by the `after_move` template.
#[derive(Debug, Deserialize)]
struct ResultLine {
    title: Option<String>,
    uploader: Option<String>,
    /// Seconds, absent when the site does not report it
    duration: Option<f64>,
    filepath: String,
}

/// Parse the JSON line printed after the file is in place.
fn parse_result(line: &str) -> Option<DownloadMessage> {
    let json = line.strip_prefix(RESULT_PREFIX)?;
    let result: ResultLine = match serde_json::from_str(json) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, line, "Unreadable downloader result");
            return None;
        }
    };

    let title = result.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| {
        Path::new(&result.filepath)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Some(DownloadMessage {
        status: STATUS_DOWNLOADED.to_string(),
        title,
        artist: result
            .uploader
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        duration: result.duration.map(|d| d.round() as i64).unwrap_or(0),
        path: result.filepath,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("progress:  42.0%"), Some(0.42));
        assert_eq!(parse_progress("progress:100.0%"), Some(1.0));
        assert_eq!(parse_progress("[download] Destination: x.webm"), None);
        assert_eq!(parse_progress("progress: N/A"), None);
    }

    #[test]
    fn test_parse_result() {
        let message = parse_result(
            "result\t{\"title\": \"Song\", \"uploader\": \"Band\", \"duration\": 212.6, \"filepath\": \"/music/Song [abc].mp3\"}",
        )
        .unwrap();
        assert!(message.is_downloaded());
        assert_eq!(message.title, "Song");
        assert_eq!(message.artist, "Band");
        assert_eq!(message.duration, 213);
        assert_eq!(message.path, "/music/Song [abc].mp3");
    }

    #[test]
    fn test_parse_result_keeps_tabs_in_titles() {
        let message = parse_result(
            "result\t{\"title\": \"Live\\tSession\", \"uploader\": \"The\\tBand\", \"duration\": 61, \"filepath\": \"/music/live.mp3\"}",
        )
        .unwrap();
        assert_eq!(message.title, "Live\tSession");
        assert_eq!(message.artist, "The\tBand");
        assert_eq!(message.duration, 61);
        assert_eq!(message.path, "/music/live.mp3");
    }

    #[test]
    fn test_parse_result_without_optional_fields() {
        let message = parse_result(
            "result\t{\"title\": null, \"duration\": null, \"filepath\": \"/music/song.mp3\"}",
        )
        .unwrap();
        assert_eq!(message.title, "song");
        assert_eq!(message.artist, UNKNOWN_ARTIST);
        assert_eq!(message.duration, 0);
    }

    #[test]
    fn test_parse_result_rejects_other_lines() {
        assert!(parse_result("result\t{\"title\": \"Song\"}").is_none());
        assert!(parse_result("result\tSong\tBand\t1\t/x.mp3").is_none());
        assert!(parse_result(r#"{"filepath": "/x.mp3"}"#).is_none());
    }

    #[test]
    fn test_args_end_with_url() {
        let downloader = YtDlpDownloader::new("yt-dlp", "/music");
        let args = downloader.args("https://youtu.be/abc123");
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc123"));
        assert!(args.iter().any(|a| a == "--extract-audio"));
    }

    #[tokio::test]
    async fn test_missing_tool_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = YtDlpDownloader::new("definitely-not-a-real-downloader", dir.path());

        let result = downloader.download("https://youtu.be/abc123").await;
        assert!(matches!(result, Err(Error::Download(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_progress_and_result_from_tool() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-downloader");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo 'progress:  12.5%'\n\
             echo 'progress: 100.0%'\n\
             printf 'result\\t{\"title\": \"Fake Song\", \"uploader\": \"Fake Artist\", \"duration\": 61, \"filepath\": \"/tmp/fake.mp3\"}\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let downloader =
            YtDlpDownloader::new(script.to_string_lossy(), dir.path().join("out"));
        downloader.download("https://youtu.be/abc123").await.unwrap();

        tokio::time::timeout(Duration::from_secs(10), async {
            while downloader.progress() < 1.0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let message = downloader.message();
        assert!(message.is_downloaded());
        assert_eq!(message.title, "Fake Song");
        assert_eq!(message.duration, 61);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("broken-downloader");
        std::fs::write(&script, "#!/bin/sh\necho 'ERROR: video unavailable' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let downloader =
            YtDlpDownloader::new(script.to_string_lossy(), dir.path().join("out"));
        downloader.download("https://youtu.be/abc123").await.unwrap();

        tokio::time::timeout(Duration::from_secs(10), async {
            while downloader.progress() < 1.0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let message = downloader.message();
        assert!(!message.is_downloaded());
        assert_eq!(message.status, "ERROR: video unavailable");
    }
}
