//! Player command - interactive playback driven by lines on stdin.
//!
//! Every state change is printed as one JSON snapshot line on stdout, so the
//! output can be piped into a status bar or another program.

use anyhow::Context as _;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

use super::Context;
use crate::db;
use crate::player::{
    AudioEngine, Interruption, PlaybackSession, PlaybackSnapshot, PlayerCommand, PlayerHandle,
    PlayerOptions,
};

const HELP: &str = "commands: play | pause | toggle | next | prev | stop | start <id> | \
queue <id> | queue-album <id> | reload | status | lost | transient | regained | help | quit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    /// Forwarded to the player as is
    Player(PlayerCommand),
    Start(i64),
    Queue(i64),
    QueueAlbum(i64),
    Reload,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let mut id = || -> Result<i64, String> {
        words
            .next()
            .ok_or_else(|| format!("{} needs an id", word))?
            .parse()
            .map_err(|_| format!("{} needs a numeric id", word))
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "play" => ConsoleCommand::Player(PlayerCommand::Play),
        "pause" => ConsoleCommand::Player(PlayerCommand::Pause),
        "toggle" | "p" => ConsoleCommand::Player(PlayerCommand::Toggle),
        "next" | "n" => ConsoleCommand::Player(PlayerCommand::Next),
        "prev" | "previous" | "b" => ConsoleCommand::Player(PlayerCommand::Previous),
        "stop" => ConsoleCommand::Player(PlayerCommand::Stop),
        "status" | "s" => ConsoleCommand::Player(PlayerCommand::Refresh),
        "lost" => ConsoleCommand::Player(PlayerCommand::Interrupt(Interruption::Lost)),
        "transient" => ConsoleCommand::Player(PlayerCommand::Interrupt(Interruption::Transient)),
        "regained" => ConsoleCommand::Player(PlayerCommand::Interrupt(Interruption::Regained)),
        "start" => ConsoleCommand::Start(id()?),
        "queue" => ConsoleCommand::Queue(id()?),
        "queue-album" => ConsoleCommand::QueueAlbum(id()?),
        "reload" => ConsoleCommand::Reload,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

pub fn cmd_player(
    rt: &Runtime,
    ctx: &Context,
    song: Option<i64>,
    album: Option<i64>,
    no_media_controls: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = ctx.open_pool().await?;

        let songs = match album {
            Some(album_id) => db::get_songs_of_album(&pool, album_id).await?,
            None => db::get_all_songs(&pool).await?,
        };

        let engine = AudioEngine::new().context("opening audio output")?;
        let format = engine.format();
        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            songs = songs.len(),
            "Player ready"
        );

        let mut session =
            PlaybackSession::new(Box::new(engine), ctx.config.playback.previous_fallback);
        session.set_songs(songs);

        let options = PlayerOptions {
            completion_poll: Duration::from_millis(ctx.config.playback.completion_poll_ms),
            media_controls: ctx.config.playback.media_controls && !no_media_controls,
        };
        let (player, task) = PlayerHandle::spawn(session, options);

        let mut snapshots = player.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match snapshots.recv().await {
                    Ok(snapshot) => print_snapshot(&snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Snapshot printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(id) = song {
            let song = db::get_song_by_id(&pool, id)
                .await?
                .with_context(|| format!("no song with id {}", id))?;
            if let Err(e) = player.start(song).await {
                eprintln!("error: {}", e);
            }
        }

        eprintln!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("{}", message);
                    continue;
                }
            };

            let result = match command {
                ConsoleCommand::Player(PlayerCommand::Refresh) => {
                    // Refresh is not broadcast, so print it here.
                    player.snapshot().await.map(|s| print_snapshot(&s))
                }
                ConsoleCommand::Player(command) => player.send(command).await.map(drop),
                ConsoleCommand::Start(id) => match db::get_song_by_id(&pool, id).await? {
                    Some(song) => player.start(song).await.map(drop),
                    None => {
                        eprintln!("no song with id {}", id);
                        continue;
                    }
                },
                ConsoleCommand::Queue(id) => match db::get_song_by_id(&pool, id).await? {
                    Some(song) => player.enqueue(song).await.map(drop),
                    None => {
                        eprintln!("no song with id {}", id);
                        continue;
                    }
                },
                ConsoleCommand::QueueAlbum(id) => {
                    let songs = db::get_songs_of_album(&pool, id).await?;
                    eprintln!("queued {} song(s)", songs.len());
                    player.enqueue_all(songs).await.map(drop)
                }
                ConsoleCommand::Reload => {
                    let songs = match album {
                        Some(album_id) => db::get_songs_of_album(&pool, album_id).await?,
                        None => db::get_all_songs(&pool).await?,
                    };
                    player.set_songs(songs).await.map(drop)
                }
                ConsoleCommand::Help => {
                    eprintln!("{}", HELP);
                    continue;
                }
                ConsoleCommand::Quit => break,
            };

            if let Err(e) = result {
                eprintln!("error: {}", e);
            }
        }

        player.shutdown().await.ok();
        drop(player);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Player task panicked");
        }
        printer.await.ok();

        Ok(())
    })
}

fn print_snapshot(snapshot: &PlaybackSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Could not serialize snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_player_commands() {
        assert_eq!(
            parse_line("play"),
            Ok(Some(ConsoleCommand::Player(PlayerCommand::Play)))
        );
        assert_eq!(
            parse_line("  PREV "),
            Ok(Some(ConsoleCommand::Player(PlayerCommand::Previous)))
        );
        assert_eq!(
            parse_line("transient"),
            Ok(Some(ConsoleCommand::Player(PlayerCommand::Interrupt(
                Interruption::Transient
            ))))
        );
    }

    #[test]
    fn test_parse_commands_with_ids() {
        assert_eq!(parse_line("start 12"), Ok(Some(ConsoleCommand::Start(12))));
        assert_eq!(parse_line("queue 3"), Ok(Some(ConsoleCommand::Queue(3))));
        assert_eq!(
            parse_line("queue-album 7"),
            Ok(Some(ConsoleCommand::QueueAlbum(7)))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("start").is_err());
        assert!(parse_line("queue abc").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
    }
}
