use crate::config;
use crate::error::TgErrorContext;
use crate::tg::{self, TgClient};
use crate::Cli;
use anyhow::Result;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub cmd: Option<AuthCommand>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Check authentication status
    Status,
    /// Remove session / logout
    Logout,
}

pub async fn run(cli: &Cli, args: &AuthArgs) -> Result<()> {
    match &args.cmd {
        Some(AuthCommand::Status) => status(cli).await,
        Some(AuthCommand::Logout) => logout(cli).await,
        None => interactive_auth(cli).await,
    }
}

fn session_path(cli: &Cli) -> PathBuf {
    config::resolve_data_dir(cli.data_dir.as_deref()).join("session.db")
}

async fn interactive_auth(cli: &Cli) -> Result<()> {
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref());
    std::fs::create_dir_all(&data_dir)?;
    let tg = TgClient::connect(&session_path(cli).to_string_lossy()).await?;
    let client = &tg.client;

    eprintln!("Starting Telegram authentication…");

    eprint!("Phone number (international format, e.g. +34612345678): ");
    io::stderr().flush()?;
    let mut phone = String::new();
    io::stdin().read_line(&mut phone)?;
    let phone = phone.trim().to_string();

    if phone.is_empty() {
        anyhow::bail!("Phone number is required");
    }

    let token = client
        .request_login_code(&phone, tg::API_HASH)
        .await
        .context_login_code(&phone)?;
    eprintln!("Login code sent via Telegram.");

    eprint!("Enter the code: ");
    io::stderr().flush()?;
    let mut code = String::new();
    io::stdin().read_line(&mut code)?;
    let code = code.trim().to_string();

    use grammers_client::SignInError;
    match client.sign_in(&token, &code).await {
        Ok(user) => {
            let name = user.first_name().map(|s| s.to_string()).unwrap_or_default();
            eprintln!("Authenticated as {}.", name);
        }
        Err(SignInError::PasswordRequired(password_token)) => {
            eprintln!("Two-factor authentication required.");
            let hint = password_token
                .hint()
                .map(|s| s.to_string())
                .unwrap_or_default();
            if !hint.is_empty() {
                eprintln!("Password hint: {}", hint);
            }
            let password = rpassword::prompt_password("Enter 2FA password: ")?;
            let user = client
                .check_password(password_token, password.as_bytes().to_vec())
                .await
                .context_2fa()?;
            let name = user.first_name().map(|s| s.to_string()).unwrap_or_default();
            eprintln!("Authenticated as {}.", name);
        }
        Err(e) => {
            anyhow::bail!("Sign in failed: {}", e);
        }
    }

    Ok(())
}

async fn status(cli: &Cli) -> Result<()> {
    let session_path = session_path(cli);

    if !session_path.exists() {
        println!("Not authenticated. Run `tgspider auth`.");
        return Ok(());
    }

    match TgClient::connect(&session_path.to_string_lossy()).await {
        Ok(tg) => {
            let authed = tg.client.is_authorized().await.context_auth_check()?;
            if authed {
                println!("Authenticated.");
            } else {
                println!("Session exists but not authenticated. Run `tgspider auth`.");
            }
        }
        Err(_) => {
            println!("Session exists but failed to connect. Try `tgspider auth`.");
        }
    }

    Ok(())
}

async fn logout(cli: &Cli) -> Result<()> {
    let session_path = session_path(cli);

    if !session_path.exists() {
        anyhow::bail!("No session found. Nothing to logout from.");
    }

    let tg = TgClient::connect(&session_path.to_string_lossy()).await?;
    tg.client.sign_out().await.context_sign_out()?;
    let _ = std::fs::remove_file(&session_path);

    println!("Logged out.");
    Ok(())
}
