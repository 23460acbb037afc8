//! CLI command definitions and dispatch.
//!
//! Each subcommand group is implemented in its own submodule:
//! - `songs`: library listing, search, import and removal
//! - `albums`: album management
//! - `player`: interactive playback session
//! - `download`: adding songs from video links
//! - `steps`: step counter
//! - `auth`: local password gate
//! - `locate`: location lookup
//! - `settings`: config file inspection

mod albums;
mod auth;
mod download;
mod locate;
mod player;
mod settings;
mod songs;
mod steps;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db;

pub use albums::cmd_albums;
pub use auth::cmd_auth;
pub use download::cmd_download;
pub use locate::cmd_locate;
pub use player::cmd_player;
pub use settings::cmd_config;
pub use songs::cmd_songs;
pub use steps::cmd_steps;

/// Music Manager CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, env = "MUSIC_MANAGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(long, global = true, env = "MUSIC_MANAGER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage songs in the library
    Songs {
        #[command(subcommand)]
        action: SongsCommand,
    },
    /// Manage albums
    Albums {
        #[command(subcommand)]
        action: AlbumsCommand,
    },
    /// Interactive player reading commands from stdin
    Player {
        /// Start playing this song id right away
        #[arg(long)]
        song: Option<i64>,
        /// Limit the song list to this album id
        #[arg(long)]
        album: Option<i64>,
        /// Do not register with the OS media controls
        #[arg(long)]
        no_media_controls: bool,
    },
    /// Download a song from a video link and add it to the library
    Download {
        /// Video link or bare video id
        link: String,
    },
    /// Step counter
    Steps {
        #[command(subcommand)]
        action: StepsCommand,
    },
    /// Local password gate
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Print the current location and a map link
    Locate {
        /// Keep printing fixes until interrupted
        #[arg(short, long)]
        follow: bool,
    },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum SongsCommand {
    /// List all songs
    List,
    /// Find songs whose title or artist is exactly QUERY
    Search { query: String },
    /// Add a local audio file
    Add { path: PathBuf },
    /// Add every audio file under a directory
    Import { path: PathBuf },
    /// Change a song's title or artist
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Delete a song and its file
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum AlbumsCommand {
    /// List all albums
    List,
    /// Find albums by exact name
    Find { name: String },
    /// Create an album
    Create { name: String },
    /// Rename an album
    Rename { id: i64, name: String },
    /// Delete an album (its songs stay in the library)
    Delete { id: i64 },
    /// Add a song to an album
    AddSong { album: i64, song: i64 },
    /// Remove a song from an album
    RemoveSong { album: i64, song: i64 },
    /// List the songs of an album
    Songs { album: i64 },
}

#[derive(Subcommand)]
pub enum StepsCommand {
    /// Print the stored total
    Show,
    /// Set the stored total
    Reset { value: i64 },
    /// Count readings from a sensor source and print each new total
    Track {
        /// File or FIFO with one cumulative reading per line (default: config, then stdin)
        #[arg(long)]
        sensor: Option<PathBuf>,
        /// Reset the total to this value before counting
        #[arg(long)]
        reset: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Set the password and recovery email
    Set { email: String },
    /// Change the password and recovery email
    Update { email: String },
    /// Check a password
    Check,
    /// Show the recovery email
    Recovery,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init,
}

/// Resolved settings shared by all commands.
pub struct Context {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub db_path: PathBuf,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let config_path = cli.config.clone().or_else(config::config_path);
        let config = match &config_path {
            Some(path) => config::load_from(path),
            None => config::load(),
        };
        let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
        Self {
            config,
            config_path,
            db_path,
        }
    }

    /// Open the library database, creating it on first use.
    pub async fn open_pool(&self) -> anyhow::Result<SqlitePool> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let pool = db::init_db(&db::db_url(Some(&self.db_path)))
            .await
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        tracing::debug!(path = %self.db_path.display(), "Database ready");
        Ok(pool)
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let ctx = Context::from_cli(cli);

    let result = match &cli.command {
        Commands::Songs { action } => cmd_songs(&rt, &ctx, action),
        Commands::Albums { action } => cmd_albums(&rt, &ctx, action),
        Commands::Player {
            song,
            album,
            no_media_controls,
        } => cmd_player(&rt, &ctx, *song, *album, *no_media_controls),
        Commands::Download { link } => cmd_download(&rt, &ctx, link),
        Commands::Steps { action } => cmd_steps(&rt, &ctx, action),
        Commands::Auth { action } => cmd_auth(&rt, &ctx, action),
        Commands::Locate { follow } => cmd_locate(&rt, &ctx, *follow),
        Commands::Config { action } => cmd_config(&ctx, action),
    };

    // A pending stdin read would otherwise block runtime drop forever
    rt.shutdown_background();
    result
}

/// Format seconds as M:SS.
pub(crate) fn format_secs(secs: i64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
