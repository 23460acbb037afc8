//! Albums command - create, rename, delete albums and manage their songs.

use anyhow::Context as _;
use tokio::runtime::Runtime;

use super::songs::print_songs;
use super::{AlbumsCommand, Context};
use crate::db;
use crate::model::Album;

pub fn cmd_albums(rt: &Runtime, ctx: &Context, action: &AlbumsCommand) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = ctx.open_pool().await?;

        match action {
            AlbumsCommand::List => {
                let albums = db::get_all_albums(&pool).await?;
                print_albums(&albums);
            }
            AlbumsCommand::Find { name } => {
                let albums = db::get_albums_by_name(&pool, name).await?;
                print_albums(&albums);
            }
            AlbumsCommand::Create { name } => {
                let id = db::insert_album(&pool, name).await?;
                tracing::info!(id, name = %name, "Album created");
                println!("Created album #{} {}", id, name);
            }
            AlbumsCommand::Rename { id, name } => {
                let album = Album {
                    id: *id,
                    name: name.clone(),
                };
                if !db::update_album(&pool, &album).await? {
                    anyhow::bail!("no album with id {}", id);
                }
                println!("Renamed album #{} to {}", id, name);
            }
            AlbumsCommand::Delete { id } => {
                if !db::delete_album(&pool, *id).await? {
                    anyhow::bail!("no album with id {}", id);
                }
                println!("Deleted album #{}", id);
            }
            AlbumsCommand::AddSong { album, song } => {
                db::add_song_to_album(&pool, *song, *album)
                    .await
                    .with_context(|| format!("adding song {} to album {}", song, album))?;
                println!("Added song #{} to album #{}", song, album);
            }
            AlbumsCommand::RemoveSong { album, song } => {
                if db::remove_song_from_album(&pool, *song, *album).await? {
                    println!("Removed song #{} from album #{}", song, album);
                } else {
                    println!("Song #{} is not in album #{}", song, album);
                }
            }
            AlbumsCommand::Songs { album } => {
                let songs = db::get_songs_of_album(&pool, *album).await?;
                print_songs(&songs);
            }
        }

        Ok(())
    })
}

fn print_albums(albums: &[Album]) {
    if albums.is_empty() {
        println!("No albums");
        return;
    }
    for album in albums {
        println!("{:>5}  {}", album.id, album.name);
    }
}
