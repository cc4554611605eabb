//! The crawl command: wire the engine together and run it until Ctrl+C.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::sync::mpsc;

use crate::config::{self, ConfigStore};
use crate::engine::{Engine, EngineOptions, ProgressEvent};
use crate::error::TgErrorContext;
use crate::shutdown::ShutdownController;
use crate::tg::api::{resolve_channels, TelegramApi};
use crate::tg::facade::ClientApi;
use crate::tg::TgClient;
use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Run one ingestion pass, drain the queues, then exit
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

pub async fn run(cli: &Cli, args: &CrawlArgs) -> Result<()> {
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref());
    let store = ConfigStore::open(&data_dir).await?;
    let snapshot = store.snapshot();
    if snapshot.spider.channels.is_empty() {
        anyhow::bail!(
            "No channels configured. Add channel ids to spider.channels in {} \
             (use `tgspider channels` to list candidates).",
            store.config_path().display()
        );
    }

    let session_path = data_dir.join("session.db");
    let tg = TgClient::connect(&session_path.to_string_lossy()).await?;
    if !tg.client.is_authorized().await.context_auth_check()? {
        anyhow::bail!("Not authenticated. Run `tgspider auth` first.");
    }

    let api: Arc<dyn TelegramApi> = Arc::new(ClientApi::new(tg.client.clone()));
    let mut channels = resolve_channels(api.as_ref(), &snapshot.spider.channels).await;
    if channels.is_empty() {
        anyhow::bail!("None of the configured channels could be resolved");
    }
    for channel in &mut channels {
        if !channel.is_forum {
            continue;
        }
        // Best effort: a forum without topics still crawls, everything
        // lands under the fallback topic directory.
        match api.forum_topics(&channel.peer).await {
            Ok(topics) => channel.topics = topics,
            Err(err) => log::warn!("failed to fetch topics of channel {}: {}", channel.id, err),
        }
        log::info!(
            "channel {} is a forum with {} topics",
            channel.id,
            channel.topics.len()
        );
        for topic in &channel.topics {
            log::debug!("  topic {}: {}", topic.id, topic.title);
        }
    }
    for channel in &channels {
        log::info!(
            "crawling channel {} ({}), checkpoint {}",
            channel.id,
            channel.title,
            store.last_id(&channel.id)
        );
    }

    let shutdown = ShutdownController::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping; in-flight downloads will finish…");
                shutdown.trigger();
            }
        });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(report_progress(events_rx));

    let opts = EngineOptions::from_config(&snapshot);
    let mut engine = Engine::new(api, store, channels, opts, shutdown).with_events(events_tx);
    let result = if args.once {
        engine.run_once().await
    } else {
        engine.run().await
    };

    drop(engine);
    let _ = progress.await;
    result
}

/// External consumer of the engine's progress events.
async fn report_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        if event.total > 0 {
            log::info!(
                "{}: {} {}/{} bytes ({}%)",
                event.channel_id,
                event.file_name,
                event.downloaded,
                event.total,
                event.downloaded * 100 / event.total
            );
        } else {
            log::info!(
                "{}: {} {} bytes",
                event.channel_id,
                event.file_name,
                event.downloaded
            );
        }
    }
}
