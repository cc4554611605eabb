//! List dialogs so the operator can pick channel ids for the config.

use anyhow::Result;
use clap::Args;

use crate::config;
use crate::error::TgErrorContext;
use crate::tg::api::TelegramApi;
use crate::tg::facade::ClientApi;
use crate::tg::TgClient;
use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct ChannelsArgs {
    /// Also list user dialogs, not just channels and groups
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

pub async fn run(cli: &Cli, args: &ChannelsArgs) -> Result<()> {
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref());
    let session_path = data_dir.join("session.db");
    let tg = TgClient::connect(&session_path.to_string_lossy()).await?;
    if !tg.client.is_authorized().await.context_auth_check()? {
        anyhow::bail!("Not authenticated. Run `tgspider auth` first.");
    }

    let api = ClientApi::new(tg.client.clone());
    let dialogs = api.dialogs().await.context_dialogs()?;

    println!("{:<16} {:<8} {:<6} TITLE", "ID", "KIND", "FORUM");
    println!("{:<16} {:<8} {:<6} Saved Messages", "me", "self", "");
    for dialog in &dialogs {
        if !args.all && dialog.kind == "user" {
            continue;
        }
        println!(
            "{:<16} {:<8} {:<6} {}",
            dialog.id,
            dialog.kind,
            if dialog.is_forum { "yes" } else { "" },
            dialog.title
        );
    }
    Ok(())
}
