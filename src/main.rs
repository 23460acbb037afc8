//! Music Manager - a personal music library, player and companion tools.
//!
//! Keeps a SQLite library of local and downloaded songs with user albums,
//! plays them through the default audio output with OS media control
//! integration, and carries a step counter, a local password gate and a
//! location lookup. Everything is driven through CLI subcommands.

pub mod acquire;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod location;
pub mod metadata;
pub mod model;
pub mod player;
pub mod scanner;
pub mod steps;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so stdout stays clean for command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("music_manager=info".parse()?))
        .init();

    cli::run_command(&args)
}
