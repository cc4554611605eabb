//! Crawler configuration: a JSON file under the data directory.
//!
//! The engine reads the config frequently and writes back only the
//! per-channel checkpoints, so the store keeps the parsed config behind a
//! lock and funnels every write through a single coalescing saver task.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::filter::{MediaKind, MediaKindSet};

pub const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TGSPIDER_DATA_DIR";

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub spider: SpiderConfig,
    pub filter: FilterConfig,
    pub file_organization: FileOrganization,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpiderConfig {
    /// Channels crawled concurrently. Messages within one channel are
    /// always processed one at a time.
    pub concurrency: usize,
    /// Channel ids to crawl; `"me"` is the saved-messages channel.
    pub channels: Vec<String>,
    /// Per-channel checkpoint: highest message id fully downloaded.
    pub last_ids: BTreeMap<String, i32>,
    /// Per-channel comma-separated media kinds; `"_"` means unset.
    pub medias: BTreeMap<String, String>,
    /// Put grouped posts into a shared directory instead of prefixing
    /// filenames with the group id.
    pub group_message: bool,
    pub enable_download_acceleration: bool,
    pub download_threads: usize,
    pub chunk_size: i32,
    pub max_retries: u32,
    /// First contact with a channel: `-1`/`0` anchor to the newest message,
    /// `k > 0` downloads the k most recent messages.
    pub new_channel_strategy: i32,
    pub ingest_interval_secs: u64,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        SpiderConfig {
            concurrency: 5,
            channels: Vec::new(),
            last_ids: BTreeMap::new(),
            medias: BTreeMap::new(),
            group_message: false,
            enable_download_acceleration: true,
            download_threads: 5,
            chunk_size: 512 * 1024,
            max_retries: 3,
            new_channel_strategy: -1,
            ingest_interval_secs: 10,
        }
    }
}

/// Size ranges (`"min-max"` bytes) keyed by kind, with per-channel
/// overrides keyed by channel id under each kind.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    pub default: BTreeMap<String, String>,
    pub photo: BTreeMap<String, String>,
    pub video: BTreeMap<String, String>,
    pub audio: BTreeMap<String, String>,
    pub file: BTreeMap<String, String>,
}

impl FilterConfig {
    fn overrides(&self, kind: MediaKind) -> &BTreeMap<String, String> {
        match kind {
            MediaKind::Photo => &self.photo,
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
            MediaKind::File => &self.file,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileOrganization {
    pub enabled: bool,
    pub create_subfolders: bool,
}

/// Resolve the data directory: explicit flag, then environment, then the
/// `./data` default.
pub fn resolve_data_dir(flag: Option<&str>) -> PathBuf {
    if let Some(dir) = flag {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(DEFAULT_DATA_DIR)
}

/// Shared handle to the parsed configuration.
///
/// `set_last_id` mutates in memory and signals the saver; the saver
/// coalesces bursts of signals into one snapshot write.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
    data_dir: PathBuf,
    save_tx: mpsc::UnboundedSender<()>,
}

impl ConfigStore {
    /// Load (or create) `config.json` under `data_dir` and spawn the saver.
    pub async fn open(data_dir: &Path) -> Result<ConfigStore> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        let path = data_dir.join(CONFIG_FILE);
        let config = if path.exists() {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("malformed config {}", path.display()))?
        } else {
            let config = Config::default();
            write_config(&path, &config).await?;
            config
        };

        let (save_tx, save_rx) = mpsc::unbounded_channel();
        let store = ConfigStore {
            inner: Arc::new(RwLock::new(config)),
            data_dir: data_dir.to_path_buf(),
            save_tx,
        };
        store.spawn_saver(save_rx);
        Ok(store)
    }

    fn spawn_saver(&self, mut save_rx: mpsc::UnboundedReceiver<()>) {
        let inner = Arc::clone(&self.inner);
        let path = self.config_path();
        tokio::spawn(async move {
            while save_rx.recv().await.is_some() {
                // Coalesce a burst of checkpoint updates into one write.
                while save_rx.try_recv().is_ok() {}
                let snapshot = inner
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Err(err) = write_config(&path, &snapshot).await {
                    log::error!("failed to persist config: {err:#}");
                }
            }
        });
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn snapshot(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_id(&self, channel: &str) -> i32 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .spider
            .last_ids
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Record a channel checkpoint and schedule a save.
    pub fn set_last_id(&self, channel: &str, last_id: i32) {
        {
            let mut config = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            config
                .spider
                .last_ids
                .insert(channel.to_string(), last_id);
        }
        let _ = self.save_tx.send(());
    }

    /// The media kinds allowed for a channel (global default: all kinds).
    pub fn media_set(&self, channel: &str) -> MediaKindSet {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .spider
            .medias
            .get(channel)
            .map(|spec| MediaKindSet::parse(spec))
            .unwrap_or_else(MediaKindSet::all)
    }

    /// Size-range spec for a kind, preferring the per-channel override.
    pub fn size_range(&self, kind: MediaKind, channel: &str) -> Option<String> {
        let config = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        config
            .filter
            .overrides(kind)
            .get(channel)
            .or_else(|| config.filter.default.get(kind.as_str()))
            .cloned()
    }

    /// Write the current snapshot out immediately. Called on shutdown so the
    /// last checkpoints cannot be lost to a still-pending saver signal.
    pub async fn flush(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_config(&self.config_path(), &snapshot).await
    }
}

async fn write_config(path: &Path, config: &Config) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
