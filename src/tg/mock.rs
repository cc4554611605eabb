//! In-memory [`TelegramApi`] used by the engine and downloader tests.
//!
//! Emulates the raw `GetHistory`/`GetReplies` window semantics and lets
//! tests script chunk failures and data-center migrations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::tg::api::{
    ChannelInfo, DialogInfo, FileLocation, MessageInfo, PeerHandle, TelegramApi, TgError,
    TgResult, TopicInfo,
};

/// A file served by the mock, with optional scripted faults.
#[derive(Default)]
pub struct FileFixture {
    pub bytes: Vec<u8>,
    /// Per-offset count of injected failures before a chunk succeeds.
    pub fail_offsets: HashMap<i64, u32>,
    /// One-shot `FILE_MIGRATE` at the given offset, redirecting to the dc.
    pub migrate_at: Option<(i64, i32)>,
}

#[derive(Default)]
pub struct MockApi {
    pub channels: Vec<ChannelInfo>,
    histories: Mutex<HashMap<PeerHandle, Vec<MessageInfo>>>,
    replies: Mutex<HashMap<(PeerHandle, i32), Vec<MessageInfo>>>,
    files: Mutex<HashMap<FileLocation, FileFixture>>,
    migrated: Mutex<HashMap<FileLocation, bool>>,

    pub chunk_calls: AtomicUsize,
    chunks_in_flight: AtomicUsize,
    pub max_chunks_in_flight: AtomicUsize,
    calls_per_offset: Mutex<HashMap<i64, u32>>,
    calls_per_dc: Mutex<HashMap<i32, u32>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: ChannelInfo) {
        self.channels.push(channel);
    }

    pub fn set_history(&self, peer: PeerHandle, mut messages: Vec<MessageInfo>) {
        messages.sort_by_key(|m| m.id);
        self.histories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(peer, messages);
    }

    pub fn set_replies(&self, peer: PeerHandle, msg_id: i32, mut comments: Vec<MessageInfo>) {
        comments.sort_by_key(|m| m.id);
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((peer, msg_id), comments);
    }

    pub fn set_file(&self, location: FileLocation, fixture: FileFixture) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(location, fixture);
    }

    pub fn calls_at_offset(&self, offset: i64) -> u32 {
        self.calls_per_offset
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&offset)
            .copied()
            .unwrap_or(0)
    }

    pub fn calls_in_dc(&self, dc_id: i32) -> u32 {
        self.calls_per_dc
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&dc_id)
            .copied()
            .unwrap_or(0)
    }

    /// Telegram's history window: newest first, `add_offset` shifting the
    /// start, negative starts shrinking (not shifting) the window.
    fn window(mut messages: Vec<MessageInfo>, offset_id: i32, add_offset: i32, limit: i32) -> Vec<MessageInfo> {
        messages.sort_by_key(|m| std::cmp::Reverse(m.id));
        let after_offset = if offset_id == 0 {
            0isize
        } else {
            messages.iter().position(|m| m.id < offset_id).unwrap_or(messages.len()) as isize
        };
        let start = after_offset + add_offset as isize;
        let end = (start + limit as isize).clamp(0, messages.len() as isize) as usize;
        let start = start.clamp(0, messages.len() as isize) as usize;
        messages[start..end.max(start)].to_vec()
    }
}

#[async_trait]
impl TelegramApi for MockApi {
    async fn dialogs(&self) -> TgResult<Vec<DialogInfo>> {
        Ok(self
            .channels
            .iter()
            .map(|c| DialogInfo {
                id: c.id.clone(),
                title: c.title.clone(),
                kind: "channel",
                is_forum: c.is_forum,
            })
            .collect())
    }

    async fn chats(&self, ids: &[String]) -> TgResult<Vec<ChannelInfo>> {
        ids.iter()
            .map(|id| {
                self.channels
                    .iter()
                    .find(|c| &c.id == id)
                    .cloned()
                    .ok_or_else(|| TgError::Unresolved(id.clone()))
            })
            .collect()
    }

    async fn forum_topics(&self, peer: &PeerHandle) -> TgResult<Vec<TopicInfo>> {
        Ok(self
            .channels
            .iter()
            .find(|c| &c.peer == peer)
            .map(|c| c.topics.clone())
            .unwrap_or_default())
    }

    async fn history(
        &self,
        peer: &PeerHandle,
        offset_id: i32,
        add_offset: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>> {
        let messages = self
            .histories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(peer)
            .cloned()
            .unwrap_or_default();
        Ok(Self::window(messages, offset_id, add_offset, limit))
    }

    async fn replies(
        &self,
        peer: &PeerHandle,
        msg_id: i32,
        offset_id: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>> {
        let thread = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(peer.clone(), msg_id))
            .cloned()
            .unwrap_or_default();
        Ok(Self::window(thread, offset_id, 0, limit))
    }

    async fn file_chunk(
        &self,
        dc_id: i32,
        location: &FileLocation,
        offset: i64,
        limit: i32,
    ) -> TgResult<Vec<u8>> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.chunks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_chunks_in_flight.fetch_max(now, Ordering::SeqCst);
        *self
            .calls_per_offset
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(offset)
            .or_insert(0) += 1;
        *self
            .calls_per_dc
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(dc_id)
            .or_insert(0) += 1;

        // Let concurrent chunk fetches overlap so tests can observe them.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.chunks_in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let Some(fixture) = files.get_mut(location) else {
            return Err(TgError::Other(format!("no fixture for {location:?}")));
        };

        if let Some((migrate_offset, new_dc)) = fixture.migrate_at {
            let mut migrated = self.migrated.lock().unwrap_or_else(|e| e.into_inner());
            let done = migrated.entry(location.clone()).or_insert(false);
            if !*done && offset == migrate_offset && dc_id != new_dc {
                *done = true;
                return Err(TgError::FileMigrate(new_dc));
            }
        }

        if let Some(remaining) = fixture.fail_offsets.get_mut(&offset) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TgError::Rpc {
                    name: "TIMEOUT".to_string(),
                    code: 500,
                });
            }
        }

        let start = (offset.max(0) as usize).min(fixture.bytes.len());
        let end = (start + limit.max(0) as usize).min(fixture.bytes.len());
        Ok(fixture.bytes[start..end].to_vec())
    }
}

/// Shorthand constructors for fixtures used across the engine tests.
pub mod fixtures {
    use super::*;
    use crate::tg::api::{DocumentInfo, MediaInfo, PhotoInfo, PhotoSizeInfo, RepliesInfo};

    pub fn channel(id: &str, title: &str) -> ChannelInfo {
        ChannelInfo {
            id: id.to_string(),
            title: title.to_string(),
            peer: PeerHandle::Channel {
                channel_id: id.parse().unwrap_or(1),
                access_hash: 7,
            },
            is_forum: false,
            topics: vec![],
        }
    }

    pub fn text_message(id: i32) -> MessageInfo {
        MessageInfo {
            id,
            date: 1_700_000_000 + id as i64,
            grouped_id: None,
            topic_id: None,
            media: None,
            replies: None,
            is_comment: false,
        }
    }

    pub fn document_message(id: i32, doc_id: i64, size: i64, dc_id: i32) -> MessageInfo {
        MessageInfo {
            media: Some(document(doc_id, size, dc_id)),
            ..text_message(id)
        }
    }

    pub fn photo_message(id: i32, photo_id: i64, size: i64, dc_id: i32) -> MessageInfo {
        MessageInfo {
            media: Some(MediaInfo::Photo(PhotoInfo {
                id: photo_id,
                access_hash: 55,
                file_reference: vec![3],
                dc_id,
                sizes: vec![PhotoSizeInfo::Plain {
                    kind: "x".to_string(),
                    bytes: size,
                }],
            })),
            ..text_message(id)
        }
    }

    pub fn document(doc_id: i64, size: i64, dc_id: i32) -> MediaInfo {
        MediaInfo::Document(DocumentInfo {
            id: doc_id,
            access_hash: 99,
            file_reference: vec![9],
            dc_id,
            size,
            mime_type: "video/mp4".to_string(),
            file_name: None,
            is_video: true,
            is_audio: false,
            attr_count: 1,
        })
    }

    pub fn with_replies(mut message: MessageInfo, count: i32, channel_id: i64) -> MessageInfo {
        message.replies = Some(RepliesInfo {
            count,
            channel_id: Some(channel_id),
        });
        message
    }

    pub fn patterned_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }
}
