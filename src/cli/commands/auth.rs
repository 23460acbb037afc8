//! Auth command - set, update and check the local password.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;

use super::{AuthCommand, Context};
use crate::auth;

/// Read the password from the environment or from one line of stdin.
async fn read_password(prompt: &str) -> anyhow::Result<String> {
    if let Ok(password) = std::env::var("MUSIC_MANAGER_PASSWORD") {
        return Ok(password);
    }
    eprint!("{}: ", prompt);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password)
}

pub fn cmd_auth(rt: &Runtime, ctx: &Context, action: &AuthCommand) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = ctx.open_pool().await?;

        match action {
            AuthCommand::Set { email } => {
                if auth::is_configured(&pool).await? {
                    println!("Replacing existing credentials");
                }
                let password = read_password("New password").await?;
                auth::set_credentials(&pool, &password, email).await?;
                println!("Password set, recovery email {}", email);
            }
            AuthCommand::Update { email } => {
                let password = read_password("New password").await?;
                auth::update_credentials(&pool, &password, email).await?;
                println!("Password updated, recovery email {}", email);
            }
            AuthCommand::Check => {
                let password = read_password("Password").await?;
                if !auth::verify(&pool, &password).await? {
                    anyhow::bail!("wrong password");
                }
                println!("Password OK");
            }
            AuthCommand::Recovery => {
                println!("{}", auth::recovery_email(&pool).await?);
            }
        }

        Ok(())
    })
}
