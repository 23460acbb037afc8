//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-manager\config.toml
//! - macOS: ~/Library/Application Support/music-manager/config.toml
//! - Linux: ~/.config/music-manager/config.toml
//!
//! The config file is human-readable and editable. Missing sections and
//! fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library and database settings
    pub library: LibraryConfig,

    /// Playback settings
    pub playback: PlaybackConfig,

    /// Song acquisition settings
    pub download: DownloadConfig,

    /// Step counter settings
    pub steps: StepsConfig,

    /// Location tracking settings
    pub location: LocationConfig,
}

/// Library management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Database file (None = `music_manager.db` in the data directory)
    pub database: Option<PathBuf>,

    /// Directory downloaded songs are written to
    pub music_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database: None,
            music_dir: dirs::audio_dir()
                .or_else(dirs::data_dir)
                .map(|d| d.join("music-manager"))
                .unwrap_or_else(|| PathBuf::from("music")),
        }
    }
}

/// What `previous` does when the history is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousFallback {
    /// Pick a uniformly random song from the list
    #[default]
    Random,
    /// Re-open the current song from the beginning
    Restart,
}

/// Audio playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Behaviour of `previous` with an empty history
    pub previous_fallback: PreviousFallback,

    /// Register with the OS media controls (media keys, now playing)
    pub media_controls: bool,

    /// How often the service checks whether the current song finished (ms)
    pub completion_poll_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            previous_fallback: PreviousFallback::Random,
            media_controls: true,
            completion_poll_ms: 500,
        }
    }
}

/// Song acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Downloader executable (searched on PATH when not absolute)
    pub tool: String,

    /// Progress poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Give up polling after this many seconds (None = wait forever)
    pub timeout_secs: Option<u64>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tool: "yt-dlp".to_string(),
            poll_interval_ms: 500,
            timeout_secs: None,
        }
    }
}

/// Step counter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsConfig {
    /// Source of raw cumulative counter readings (None = stdin)
    pub sensor_path: Option<PathBuf>,
}

/// Location tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// IP geolocation endpoint returning JSON with `lat` and `lon`
    pub endpoint: String,

    /// Interval between fixes when following (seconds)
    pub interval_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://ip-api.com/json".to_string(),
            interval_secs: 10,
        }
    }
}

impl Config {
    /// Resolve the database file path.
    pub fn database_path(&self) -> PathBuf {
        self.library.database.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("music-manager"))
                .unwrap_or_default()
                .join(crate::db::DEFAULT_DB_NAME)
        })
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-manager"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file.
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to a specific file (atomic write via temp + rename).
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[playback]"));
        assert!(toml.contains("[download]"));
        assert!(toml.contains("[location]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[playback]
previous_fallback = "restart"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.playback.previous_fallback, PreviousFallback::Restart);
        assert!(config.playback.media_controls);
        assert_eq!(config.download.tool, "yt-dlp");
        assert_eq!(config.download.poll_interval_ms, 500);
        assert!(config.download.timeout_secs.is_none());
        assert_eq!(config.location.interval_secs, 10);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.download.timeout_secs = Some(120);
        config.library.database = Some(PathBuf::from("/tmp/library.db"));
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.download.timeout_secs, Some(120));
        assert_eq!(loaded.database_path(), PathBuf::from("/tmp/library.db"));
    }

    #[test]
    fn test_unparseable_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = load_from(&path);
        assert_eq!(config.playback.completion_poll_ms, 500);
    }
}
