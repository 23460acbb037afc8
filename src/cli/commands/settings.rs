//! Config command - print the effective config or write the defaults.

use anyhow::Context as _;

use super::{ConfigCommand, Context};
use crate::config::{self, Config};

pub fn cmd_config(ctx: &Context, action: &ConfigCommand) -> anyhow::Result<()> {
    match action {
        ConfigCommand::Show => {
            match &ctx.config_path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# no config directory, showing defaults"),
            }
            println!("# database: {}", ctx.db_path.display());
            println!();
            print!("{}", toml::to_string_pretty(&ctx.config)?);
        }
        ConfigCommand::Init => {
            let defaults = Config::default();
            match &ctx.config_path {
                Some(path) => {
                    if path.exists() {
                        anyhow::bail!("{} already exists", path.display());
                    }
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("creating {}", parent.display()))?;
                    }
                    config::save_to(&defaults, path)?;
                    println!("Wrote {}", path.display());
                }
                None => {
                    config::save(&defaults)?;
                    println!("Wrote default config");
                }
            }
        }
    }
    Ok(())
}
