//! Locate command - print location fixes with map links.

use futures::StreamExt;
use std::time::Duration;
use tokio::runtime::Runtime;

use super::Context;
use crate::location::{self, IpLocationProvider, LocationFix, LocationProvider};

pub fn cmd_locate(rt: &Runtime, ctx: &Context, follow: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let provider = IpLocationProvider::new(ctx.config.location.endpoint.clone())?;

        if !follow {
            let fix = provider.locate().await?;
            print_fix(&fix);
            return Ok(());
        }

        let interval = Duration::from_secs(ctx.config.location.interval_secs.max(1));
        let mut fixes = std::pin::pin!(location::track(&provider, interval));
        loop {
            let fix = tokio::select! {
                fix = fixes.next() => fix,
                _ = tokio::signal::ctrl_c() => break,
            };
            match fix {
                Some(Ok(fix)) => print_fix(&fix),
                Some(Err(e)) => eprintln!("error: {}", e),
                None => break,
            }
        }

        Ok(())
    })
}

fn print_fix(fix: &LocationFix) {
    println!(
        "{}  {:.5}, {:.5}  {}",
        fix.timestamp.format("%H:%M:%S"),
        fix.latitude,
        fix.longitude,
        fix.map_url()
    );
}
