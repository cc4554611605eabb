//! The crawl engine: per-channel ingestion, scheduling and downloads.
//!
//! Everything the engine touches lives inside the [`Engine`] value; there is
//! no ambient state. Channel records are owned by the scheduler task alone,
//! so queue and checkpoint updates never race.

pub mod download;
pub mod filter;
pub mod ingest;
pub mod path;
mod scheduler;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::{Config, ConfigStore};
use crate::engine::download::DownloadOptions;
use crate::engine::filter::MediaKindSet;
use crate::engine::ingest::Task;
use crate::shutdown::ShutdownController;
use crate::tg::api::{ChannelInfo, TelegramApi};

/// Emitted after every fetched chunk; consumers are external.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub channel_id: String,
    pub file_name: String,
    pub downloaded: u64,
    pub total: u64,
}

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub concurrency: usize,
    pub ingest_interval: Duration,
    pub new_channel_strategy: i32,
    pub group_message: bool,
    pub organize_by_type: bool,
    pub download: DownloadOptions,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> EngineOptions {
        EngineOptions {
            concurrency: config.spider.concurrency.max(1),
            ingest_interval: Duration::from_secs(config.spider.ingest_interval_secs.max(1)),
            new_channel_strategy: config.spider.new_channel_strategy,
            group_message: config.spider.group_message,
            organize_by_type: config.file_organization.enabled
                && config.file_organization.create_subfolders,
            download: DownloadOptions {
                accelerate: config.spider.enable_download_acceleration,
                threads: config.spider.download_threads,
                chunk_size: config.spider.chunk_size,
                max_retries: config.spider.max_retries,
            },
        }
    }
}

/// Mutable per-channel record, owned by the scheduler.
pub(crate) struct ChannelState {
    pub info: ChannelInfo,
    pub medias_allowed: MediaKindSet,
    pub last_id: i32,
    pub queue: VecDeque<Task>,
    pub downloading: bool,
    pub last_download_time: Instant,
}

pub struct Engine {
    pub(crate) api: Arc<dyn TelegramApi>,
    pub(crate) config: ConfigStore,
    pub(crate) opts: EngineOptions,
    pub(crate) data_dir: PathBuf,
    pub(crate) channels: Vec<ChannelState>,
    pub(crate) shutdown: ShutdownController,
    pub(crate) events: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Engine {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        config: ConfigStore,
        channels: Vec<ChannelInfo>,
        opts: EngineOptions,
        shutdown: ShutdownController,
    ) -> Engine {
        let channels = channels
            .into_iter()
            .map(|info| ChannelState {
                last_id: config.last_id(&info.id),
                medias_allowed: config.media_set(&info.id),
                queue: VecDeque::new(),
                downloading: false,
                last_download_time: Instant::now(),
                info,
            })
            .collect();
        let data_dir = config.data_dir().to_path_buf();
        Engine {
            api,
            config,
            opts,
            data_dir,
            channels,
            shutdown,
            events: None,
        }
    }

    /// Attach a progress-event sink.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ProgressEvent>) -> Engine {
        self.events = Some(events);
        self
    }

    #[cfg(test)]
    pub(crate) fn channel_last_id(&self, channel_id: &str) -> Option<i32> {
        self.channels
            .iter()
            .find(|c| c.info.id == channel_id)
            .map(|c| c.last_id)
    }
}
