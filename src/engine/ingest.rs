//! Per-channel ingestion: turn remote history into ordered local tasks.
//!
//! One page per channel per pass keeps memory bounded and stop latency low;
//! the scheduler drives further pages by reinvoking on its tick. Comments
//! are harvested from reply threads and queued right after their parent,
//! but never move the channel checkpoint.

use anyhow::Result;

use crate::engine::filter::{self, MediaKind, MediaKindSet};
use crate::engine::Engine;
use crate::error::TgErrorContext;
use crate::tg::api::{ChannelInfo, MediaInfo, MessageInfo};

/// History page size per ingestion pass.
pub(crate) const HISTORY_PAGE: i32 = 100;

/// Reply threads are paged explicitly instead of requesting "everything".
pub(crate) const REPLIES_PAGE: i32 = 100;

/// One unit of scheduler work: a single message and the media fetches it
/// requires (possibly none; the empty task still carries the checkpoint
/// forward for non-comments).
#[derive(Clone, Debug)]
pub(crate) struct Task {
    pub message_id: i32,
    pub date: i64,
    pub is_comment: bool,
    pub topic_id: Option<String>,
    pub grouped_id: Option<String>,
    pub downloads: Vec<(MediaKind, MediaInfo)>,
}

impl Task {
    fn date_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.date, 0)
            .map(|date| date.to_rfc3339())
            .unwrap_or_else(|| self.date.to_string())
    }
}

pub(crate) enum PageOutcome {
    /// First contact: record the anchor checkpoint, enqueue nothing.
    Anchor(i32),
    Tasks(Vec<Task>),
}

impl Engine {
    /// One ingestion pass: give every idle channel with an empty queue one
    /// page of fresh history. Failures are logged and retried next tick.
    pub(crate) async fn ingest_pass(&mut self) {
        for idx in 0..self.channels.len() {
            if self.shutdown.is_triggered() {
                return;
            }
            {
                let state = &self.channels[idx];
                if !state.queue.is_empty() || state.downloading {
                    continue;
                }
            }
            let info = self.channels[idx].info.clone();
            let last_id = self.channels[idx].last_id;
            let allowed = self.channels[idx].medias_allowed;
            match self.fetch_page(&info, last_id, allowed).await {
                Ok(PageOutcome::Anchor(anchor)) => {
                    if anchor > 0 {
                        let state = &mut self.channels[idx];
                        state.last_id = anchor;
                        self.config.set_last_id(&info.id, anchor);
                        log::info!("channel {} anchored at message {}", info.id, anchor);
                    }
                }
                Ok(PageOutcome::Tasks(tasks)) => {
                    if let Some(newest) = tasks.last() {
                        log::debug!(
                            "channel {}: queued {} messages, newest from {}",
                            info.id,
                            tasks.len(),
                            newest.date_rfc3339()
                        );
                    }
                    self.channels[idx].queue.extend(tasks);
                }
                Err(err) => {
                    log::warn!("ingestion failed for channel {}: {err:#}", info.id);
                }
            }
        }
    }

    async fn fetch_page(
        &self,
        info: &ChannelInfo,
        last_id: i32,
        allowed: MediaKindSet,
    ) -> Result<PageOutcome> {
        if last_id == 0 {
            let strategy = self.opts.new_channel_strategy;
            if strategy <= 0 {
                // Anchor to the newest message; older history is never
                // retro-crawled.
                let page = self
                    .api
                    .history(&info.peer, 0, 0, 1)
                    .await
                    .context_history(&info.id)?;
                let anchor = page.iter().map(|m| m.id).max().unwrap_or(0);
                return Ok(PageOutcome::Anchor(anchor));
            }
            let mut page = self
                .api
                .history(&info.peer, 0, 0, strategy)
                .await
                .context_history(&info.id)?;
            page.sort_by_key(|m| m.id);
            let tasks = self.build_tasks(info, allowed, page).await;
            return Ok(PageOutcome::Tasks(tasks));
        }

        // `add_offset = -1 - page` anchors the window right above `last_id`;
        // requesting one extra slot keeps the window gapless even when the
        // checkpoint message itself has been deleted. The retain below drops
        // the checkpoint message when the server includes it.
        let mut page = self
            .api
            .history(&info.peer, last_id, -HISTORY_PAGE - 1, HISTORY_PAGE + 1)
            .await
            .context_history(&info.id)?;
        page.retain(|m| m.id > last_id);
        page.sort_by_key(|m| m.id);
        let tasks = self.build_tasks(info, allowed, page).await;
        Ok(PageOutcome::Tasks(tasks))
    }

    /// Convert an oldest-first page into tasks, expanding reply threads
    /// behind their parent message.
    async fn build_tasks(
        &self,
        info: &ChannelInfo,
        allowed: MediaKindSet,
        page: Vec<MessageInfo>,
    ) -> Vec<Task> {
        let mut tasks = Vec::new();
        for message in page {
            let has_thread = message
                .replies
                .as_ref()
                .is_some_and(|r| r.count > 0 && r.channel_id.is_some());
            let message_id = message.id;
            tasks.push(self.task_for(info, allowed, &message));

            if !has_thread {
                continue;
            }
            match self
                .fetch_thread(info, message_id)
                .await
                .context_replies(&info.id, message_id)
            {
                Ok(comments) => {
                    for comment in &comments {
                        let task = self.task_for(info, allowed, comment);
                        // Comments never advance the checkpoint; queueing
                        // them is only useful when there is media to fetch.
                        if !task.downloads.is_empty() {
                            tasks.push(task);
                        }
                    }
                }
                // Best effort: an unavailable thread just means no comments.
                Err(err) => log::debug!("{err:#}"),
            }
        }
        tasks
    }

    fn task_for(&self, info: &ChannelInfo, allowed: MediaKindSet, message: &MessageInfo) -> Task {
        let mut downloads = Vec::new();
        if let Some(media) = &message.media {
            if let Some(kind) = filter::classify(media) {
                if allowed.contains(kind) && self.size_allowed(info, kind, media) {
                    downloads.push((kind, media.clone()));
                }
            }
        }
        downloads.sort_by_key(|(kind, _)| *kind);
        Task {
            message_id: message.id,
            date: message.date,
            is_comment: message.is_comment,
            topic_id: resolve_topic(info, message),
            grouped_id: message.grouped_id.map(|g| g.to_string()),
            downloads,
        }
    }

    fn size_allowed(&self, info: &ChannelInfo, kind: MediaKind, media: &MediaInfo) -> bool {
        let range = self.config.size_range(kind, &info.id);
        filter::size_allowed(filter::media_size(media), range.as_deref())
    }

    /// Fetch a full reply thread, newest pages first, returned oldest-first
    /// and marked as comments.
    async fn fetch_thread(
        &self,
        info: &ChannelInfo,
        msg_id: i32,
    ) -> Result<Vec<MessageInfo>, crate::tg::api::TgError> {
        let mut thread = Vec::new();
        let mut offset_id = 0;
        loop {
            let page = self
                .api
                .replies(&info.peer, msg_id, offset_id, REPLIES_PAGE)
                .await?;
            if page.is_empty() {
                break;
            }
            let short_page = (page.len() as i32) < REPLIES_PAGE;
            offset_id = page.iter().map(|m| m.id).min().unwrap_or(0);
            thread.extend(page);
            if short_page {
                break;
            }
        }
        thread.sort_by_key(|m| m.id);
        for comment in &mut thread {
            comment.is_comment = true;
        }
        Ok(thread)
    }
}

/// Topic directory id for a message: forum channels always have one, with
/// `"1"` standing in when the topic cannot be resolved. Non-forum channels
/// have none.
fn resolve_topic(info: &ChannelInfo, message: &MessageInfo) -> Option<String> {
    if info.is_forum {
        Some(message.topic_id.unwrap_or(1).to_string())
    } else {
        None
    }
}
