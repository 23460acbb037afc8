//! Command-line interface for music-manager.
//!
//! Every feature is reached through a subcommand: library and album
//! management, the interactive player, downloads, the step counter, the
//! password gate and location lookup.

mod commands;

pub use commands::{Cli, Commands, run_command};
