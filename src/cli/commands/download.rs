//! Download command - fetch a song from a video link into the library.

use std::io::Write;
use tokio::runtime::Runtime;

use super::Context;
use crate::acquire::{self, AcquireOptions, YtDlpDownloader};

pub fn cmd_download(rt: &Runtime, ctx: &Context, link: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        // Reject bad links before touching the database or spawning anything.
        let url = acquire::validate_link(link)?;
        let pool = ctx.open_pool().await?;

        let music_dir = &ctx.config.library.music_dir;
        tokio::fs::create_dir_all(music_dir).await?;

        let downloader = YtDlpDownloader::new(ctx.config.download.tool.clone(), music_dir.clone());
        let options = AcquireOptions::from(&ctx.config.download);

        println!("Downloading {}", url);
        let mut last_percent = None;
        let result = acquire::acquire(&pool, &downloader, &url, &options, |progress| {
            let percent = (progress * 100.0).round() as u32;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                print!("\r  {:>3}%", percent);
                std::io::stdout().flush().ok();
            }
        })
        .await;
        println!();

        let song = result?;
        println!(
            "Added #{} {} - {} ({})",
            song.id,
            song.artist,
            song.title,
            song.path
        );
        Ok(())
    })
}
