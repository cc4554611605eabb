//! Dispatching: fan channels into a bounded pool of downloads.
//!
//! The scheduler task owns all channel state. Downloads run as spawned
//! tasks and report back over a channel, so there is no polling and no
//! shared mutation: one message per channel at a time, at most
//! `spider.concurrency` channels at once, and the checkpoint moves only
//! after a message's media is fully on disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::engine::download::{DownloadOptions, Downloader};
use crate::engine::filter::MediaKind;
use crate::engine::ingest::Task;
use crate::engine::path::{self, PathOptions};
use crate::engine::{Engine, ProgressEvent};
use crate::tg::api::{MediaInfo, TelegramApi};

struct Completed {
    channel: usize,
    message_id: i32,
    is_comment: bool,
    ok: bool,
}

impl Engine {
    /// Run until the shutdown controller is triggered, then drain in-flight
    /// downloads and flush the final checkpoints.
    pub async fn run(&mut self) -> Result<()> {
        log::info!(
            "crawling {} channels, concurrency {}",
            self.channels.len(),
            self.opts.concurrency
        );
        let mut tick = tokio::time::interval(self.opts.ingest_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut active = 0usize;
        let shutdown = self.shutdown.clone();

        while !shutdown.is_triggered() {
            self.dispatch(&done_tx, &mut active);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => self.ingest_pass().await,
                Some(done) = done_rx.recv() => {
                    active -= 1;
                    self.on_completed(done);
                }
            }
        }

        drop(done_tx);
        if active > 0 {
            log::info!("waiting for {} in-flight downloads", active);
        }
        while active > 0 {
            match done_rx.recv().await {
                Some(done) => {
                    active -= 1;
                    self.on_completed(done);
                }
                None => break,
            }
        }
        self.config.flush().await.context("failed to flush config on shutdown")?;
        log::info!("engine stopped");
        Ok(())
    }

    /// One ingestion pass, then drain every queued task. Used by
    /// `crawl --once` and by tests that need determinism.
    pub async fn run_once(&mut self) -> Result<()> {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut active = 0usize;
        self.ingest_pass().await;
        loop {
            self.dispatch(&done_tx, &mut active);
            if active == 0 {
                break;
            }
            let Some(done) = done_rx.recv().await else { break };
            active -= 1;
            self.on_completed(done);
        }
        self.config.flush().await.context("failed to flush config")?;
        Ok(())
    }

    fn dispatch(&mut self, done_tx: &mpsc::UnboundedSender<Completed>, active: &mut usize) {
        while *active < self.opts.concurrency {
            let Some(idx) = self.pick_channel() else { break };
            let Some(task) = self.channels[idx].queue.pop_front() else { break };
            let state = &mut self.channels[idx];
            state.downloading = true;
            log::debug!(
                "channel {}: message {} ({} media)",
                state.info.id,
                task.message_id,
                task.downloads.len()
            );
            let job = DownloadJob {
                api: Arc::clone(&self.api),
                opts: self.opts.download.clone(),
                data_dir: self.data_dir.clone(),
                channel_id: state.info.id.clone(),
                channel_title: state.info.title.clone(),
                group_message: self.opts.group_message,
                organize_by_type: self.opts.organize_by_type,
                events: self.events.clone(),
                task,
            };
            let done_tx = done_tx.clone();
            let channel = idx;
            tokio::spawn(async move {
                let message_id = job.task.message_id;
                let is_comment = job.task.is_comment;
                let ok = job.run().await;
                let _ = done_tx.send(Completed {
                    channel,
                    message_id,
                    is_comment,
                    ok,
                });
            });
            *active += 1;
        }
    }

    /// Oldest-served-first fairness among channels that are idle and have
    /// pending work.
    fn pick_channel(&self) -> Option<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.downloading && !s.queue.is_empty())
            .min_by_key(|(_, s)| s.last_download_time)
            .map(|(idx, _)| idx)
    }

    fn on_completed(&mut self, done: Completed) {
        let state = &mut self.channels[done.channel];
        state.downloading = false;
        state.last_download_time = Instant::now();
        if !done.ok {
            log::warn!(
                "channel {}: message {} failed, will be re-offered",
                state.info.id,
                done.message_id
            );
            return;
        }
        if !done.is_comment && done.message_id > state.last_id {
            state.last_id = done.message_id;
            self.config.set_last_id(&state.info.id, state.last_id);
        }
    }
}

/// A single message's downloads, executed sequentially in kind order.
struct DownloadJob {
    api: Arc<dyn TelegramApi>,
    opts: DownloadOptions,
    data_dir: PathBuf,
    channel_id: String,
    channel_title: String,
    group_message: bool,
    organize_by_type: bool,
    events: Option<mpsc::UnboundedSender<ProgressEvent>>,
    task: Task,
}

impl DownloadJob {
    async fn run(&self) -> bool {
        for (kind, media) in &self.task.downloads {
            if let Err(err) = self.fetch_one(*kind, media).await {
                log::warn!(
                    "channel {}: download of message {} failed: {err:#}",
                    self.channel_id,
                    self.task.message_id
                );
                return false;
            }
        }
        true
    }

    async fn fetch_one(&self, kind: MediaKind, media: &MediaInfo) -> Result<()> {
        let dest = path::dest_path(&PathOptions {
            data_dir: &self.data_dir,
            channel_title: &self.channel_title,
            channel_id: &self.channel_id,
            topic_id: self.task.topic_id.as_deref(),
            grouped_id: self.task.grouped_id.as_deref(),
            group_message: self.group_message,
            organize_by_type: self.organize_by_type,
            kind,
            message_id: self.task.message_id,
            raw_file_name: media.raw_file_name(),
            mime_type: media.mime_type(),
        });
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let events = self.events.clone();
        let channel_id = self.channel_id.clone();
        let downloader = Downloader::new(Arc::clone(&self.api), self.opts.clone());
        downloader
            .download(media, &dest, move |downloaded, total| {
                if let Some(events) = &events {
                    let _ = events.send(ProgressEvent {
                        channel_id: channel_id.clone(),
                        file_name: file_name.clone(),
                        downloaded,
                        total,
                    });
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::engine::EngineOptions;
    use crate::shutdown::ShutdownController;
    use crate::tg::mock::{fixtures, FileFixture, MockApi};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Rig {
        engine: Engine,
        api: Arc<MockApi>,
        dir: tempfile::TempDir,
    }

    async fn rig(api: MockApi) -> Rig {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ConfigStore::open(dir.path()).await.expect("config");
        let channels = api.channels.clone();
        let api = Arc::new(api);
        let mut opts = EngineOptions::from_config(&config.snapshot());
        opts.ingest_interval = Duration::from_millis(10);
        let engine = Engine::new(
            Arc::clone(&api) as Arc<dyn TelegramApi>,
            config,
            channels,
            opts,
            ShutdownController::new(),
        );
        Rig { engine, api, dir }
    }

    fn serve_photo(api: &MockApi, message: &crate::tg::api::MessageInfo, len: usize) {
        let media = message.media.as_ref().expect("message has media");
        api.set_file(
            media.location(),
            FileFixture {
                bytes: fixtures::patterned_bytes(len),
                ..FileFixture::default()
            },
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_photo_download_end_to_end() {
        let len = 2 * 1024 * 1024;
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let message = fixtures::photo_message(200, 1000, len as i64, 2);
        serve_photo(&api, &message, len);
        api.set_history(peer, vec![message]);

        let mut rig = rig(api).await;
        rig.engine.opts.download.threads = 4;
        rig.engine.channels[0].last_id = 100;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        rig.engine.events = Some(events_tx);

        rig.engine.run_once().await.expect("run_once");

        let dest = rig.dir.path().join("c1").join("200.jpg");
        assert_eq!(
            std::fs::read(&dest).expect("downloaded file"),
            fixtures::patterned_bytes(len),
            "bytes must round-trip"
        );
        assert_eq!(rig.api.chunk_calls.load(Ordering::SeqCst), 4);
        assert_eq!(rig.engine.channel_last_id("100"), Some(200));
        assert_eq!(rig.engine.config.last_id("100"), 200, "checkpoint persisted");

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.channel_id == "100" && e.file_name == "200.jpg"));
        assert!(events.windows(2).all(|w| w[0].downloaded <= w[1].downloaded));
        let last = events.last().expect("final event");
        assert_eq!((last.downloaded, last.total), (len as u64, len as u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_download_leaves_checkpoint() {
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let message = fixtures::photo_message(300, 1000, (2 * 1024 * 1024) as i64, 2);
        let media = message.media.as_ref().expect("media");
        api.set_file(
            media.location(),
            FileFixture {
                bytes: fixtures::patterned_bytes(2 * 1024 * 1024),
                fail_offsets: HashMap::from([(0, 999)]),
                ..FileFixture::default()
            },
        );
        api.set_history(peer, vec![message]);

        let mut rig = rig(api).await;
        rig.engine.opts.download.max_retries = 0;
        rig.engine.channels[0].last_id = 100;
        rig.engine.run_once().await.expect("run_once");

        assert_eq!(rig.engine.channel_last_id("100"), Some(100), "checkpoint untouched");
        assert_eq!(rig.engine.config.last_id("100"), 0, "nothing persisted");
        assert!(!rig.engine.channels[0].downloading, "channel released");
    }

    #[tokio::test(start_paused = true)]
    async fn test_filtered_message_still_advances_checkpoint() {
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        // 2 MiB video, filtered below.
        api.set_history(peer, vec![fixtures::document_message(400, 41, 2 * 1024 * 1024, 2)]);

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"filter": {"default": {"video": "0-1048576"}}}"#,
        )
        .expect("write config");
        let config = ConfigStore::open(dir.path()).await.expect("config");
        let channels = api.channels.clone();
        let opts = EngineOptions::from_config(&config.snapshot());
        let mut engine = Engine::new(
            Arc::new(api) as Arc<dyn TelegramApi>,
            config,
            channels,
            opts,
            ShutdownController::new(),
        );
        engine.channels[0].last_id = 100;
        engine.run_once().await.expect("run_once");

        assert_eq!(engine.channel_last_id("100"), Some(400), "no media to download is not a failure");
        assert!(
            !dir.path().join("c1").exists(),
            "nothing was written for the filtered media"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_comment_downloads_do_not_advance_checkpoint() {
        let len = 2 * 1024 * 1024;
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let parent = fixtures::with_replies(fixtures::text_message(500), 1, 555);
        let comment = fixtures::photo_message(9000, 77, len as i64, 2);
        serve_photo(&api, &comment, len);
        api.set_replies(peer.clone(), 500, vec![comment]);
        api.set_history(peer, vec![parent]);

        let mut rig = rig(api).await;
        rig.engine.channels[0].last_id = 100;
        rig.engine.run_once().await.expect("run_once");

        assert_eq!(
            rig.engine.channel_last_id("100"),
            Some(500),
            "the parent advances the checkpoint"
        );
        assert!(
            rig.dir.path().join("c1").join("9000.jpg").exists(),
            "the comment's media is downloaded"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_message_directory_layout() {
        let len = 64 * 1024;
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let mut first = fixtures::photo_message(300, 51, len as i64, 2);
        first.grouped_id = Some(7777);
        let mut second = fixtures::photo_message(301, 52, len as i64, 2);
        second.grouped_id = Some(7777);
        serve_photo(&api, &first, len);
        serve_photo(&api, &second, len);
        api.set_history(peer, vec![first, second]);

        let mut rig = rig(api).await;
        rig.engine.opts.group_message = true;
        rig.engine.channels[0].last_id = 100;
        rig.engine.run_once().await.expect("run_once");

        assert!(rig.dir.path().join("c1").join("7777").join("300.jpg").exists());
        assert!(rig.dir.path().join("c1").join("7777").join("301.jpg").exists());
        assert_eq!(rig.engine.channel_last_id("100"), Some(301));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forum_topic_directory_layout() {
        let len = 64 * 1024;
        let mut api = MockApi::new();
        let mut channel = fixtures::channel("100", "forum");
        channel.is_forum = true;
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let mut message = fixtures::photo_message(500, 61, len as i64, 2);
        message.topic_id = Some(7);
        serve_photo(&api, &message, len);
        api.set_history(peer, vec![message]);

        let mut rig = rig(api).await;
        rig.engine.channels[0].last_id = 100;
        rig.engine.run_once().await.expect("run_once");

        assert!(rig.dir.path().join("forum").join("_7").join("500.jpg").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_channel_parallelism_is_bounded() {
        let len = 256 * 1024; // below the acceleration cutoff: one chunk in flight per file
        let mut api = MockApi::new();
        let mut messages = Vec::new();
        for i in 0..4 {
            let id = format!("{}", 100 + i);
            let channel = fixtures::channel(&id, &format!("c{i}"));
            let peer = channel.peer.clone();
            api.add_channel(channel);
            let message = fixtures::photo_message(200, 1000 + i as i64, len as i64, 2);
            serve_photo(&api, &message, len);
            messages.push((peer, message));
        }
        for (peer, message) in messages {
            api.set_history(peer, vec![message]);
        }

        let mut rig = rig(api).await;
        rig.engine.opts.concurrency = 2;
        for state in &mut rig.engine.channels {
            state.last_id = 100;
        }
        rig.engine.run_once().await.expect("run_once");

        assert!(
            rig.api.max_chunks_in_flight.load(Ordering::SeqCst) <= 2,
            "at most `concurrency` channels may fetch at once"
        );
        for i in 0..4 {
            assert_eq!(rig.engine.channel_last_id(&format!("{}", 100 + i)), Some(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_queue_is_serialized() {
        let len = 256 * 1024;
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let first = fixtures::photo_message(201, 71, len as i64, 2);
        let second = fixtures::photo_message(202, 72, len as i64, 2);
        serve_photo(&api, &first, len);
        serve_photo(&api, &second, len);
        api.set_history(peer, vec![first, second]);

        let mut rig = rig(api).await;
        rig.engine.opts.concurrency = 5;
        rig.engine.channels[0].last_id = 100;
        rig.engine.run_once().await.expect("run_once");

        assert_eq!(
            rig.api.max_chunks_in_flight.load(Ordering::SeqCst),
            1,
            "messages of one channel never download concurrently"
        );
        assert_eq!(rig.engine.channel_last_id("100"), Some(202));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_checkpoints_monotonically_across_ticks() {
        let len = 64 * 1024;
        let mut api = MockApi::new();
        let channel = fixtures::channel("100", "c1");
        let peer = channel.peer.clone();
        api.add_channel(channel);
        let mut history = Vec::new();
        for id in [210, 220, 230] {
            let message = fixtures::photo_message(id, id as i64, len as i64, 2);
            serve_photo(&api, &message, len);
            history.push(message);
        }
        api.set_history(peer, history);

        let mut rig = rig(api).await;
        rig.engine.channels[0].last_id = 200;
        let shutdown = rig.engine.shutdown.clone();

        let run = rig.engine.run();
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            shutdown.trigger();
        };
        let (run_result, ()) = tokio::join!(run, stopper);
        run_result.expect("run");

        assert_eq!(rig.engine.channel_last_id("100"), Some(230));
        assert_eq!(rig.engine.config.last_id("100"), 230);
    }
}
