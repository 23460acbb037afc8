//! Songs command - list, search, add, import, edit and remove songs.

use anyhow::Context as _;
use futures::StreamExt;
use tokio::runtime::Runtime;

use super::{Context, SongsCommand, format_secs};
use crate::db;
use crate::library::{self, ImportEvent};
use crate::model::Song;

pub fn cmd_songs(rt: &Runtime, ctx: &Context, action: &SongsCommand) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = ctx.open_pool().await?;

        match action {
            SongsCommand::List => {
                let songs = db::get_all_songs(&pool).await?;
                print_songs(&songs);
            }
            SongsCommand::Search { query } => {
                let songs = db::find_songs(&pool, query).await?;
                if songs.is_empty() {
                    println!("No songs match \"{}\"", query);
                } else {
                    print_songs(&songs);
                }
            }
            SongsCommand::Add { path } => {
                let song = library::add_local_file(&pool, path)
                    .await
                    .with_context(|| format!("adding {}", path.display()))?;
                println!("Added #{} {} - {}", song.id, song.artist, song.title);
            }
            SongsCommand::Import { path } => {
                println!("Importing {}...", path.display());
                let mut events = std::pin::pin!(library::import_directory(pool.clone(), path.clone()));
                let mut added = 0;
                let mut failed = 0;
                while let Some(event) = events.next().await {
                    match event {
                        ImportEvent::Added(song) => {
                            added += 1;
                            println!("  + #{} {} - {}", song.id, song.artist, song.title);
                        }
                        ImportEvent::Error(path, message) => {
                            failed += 1;
                            println!("  ! {}: {}", path.display(), message);
                        }
                    }
                }
                println!();
                println!("Import complete: {} added, {} failed", added, failed);
            }
            SongsCommand::Edit { id, title, artist } => {
                let mut song = db::get_song_by_id(&pool, *id)
                    .await?
                    .with_context(|| format!("no song with id {}", id))?;
                if let Some(title) = title {
                    song.title = title.clone();
                }
                if let Some(artist) = artist {
                    song.artist = artist.clone();
                }
                db::update_song(&pool, &song).await?;
                println!("Updated #{} {} - {}", song.id, song.artist, song.title);
            }
            SongsCommand::Remove { id } => {
                let song = db::get_song_by_id(&pool, *id)
                    .await?
                    .with_context(|| format!("no song with id {}", id))?;
                library::remove_song(&pool, &song).await?;
                println!("Removed #{} {} - {}", song.id, song.artist, song.title);
            }
        }

        Ok(())
    })
}

pub(super) fn print_songs(songs: &[Song]) {
    if songs.is_empty() {
        println!("No songs in the library");
        return;
    }
    println!("{:>5}  {:<30}  {:<24}  {:>6}", "ID", "TITLE", "ARTIST", "TIME");
    for song in songs {
        println!(
            "{:>5}  {:<30}  {:<24}  {:>6}",
            song.id,
            truncate(&song.title, 30),
            truncate(&song.artist, 24),
            format_secs(song.duration)
        );
    }
    println!();
    println!("{} song(s)", songs.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("much too long", 5), "much…");
        assert_eq!(truncate("żółć gęślą", 4), "żół…");
    }
}
