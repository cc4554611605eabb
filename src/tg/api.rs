//! Typed surface over the Telegram RPC calls the engine needs.
//!
//! The engine never talks to grammers directly; it goes through
//! [`TelegramApi`], which keeps the crawler testable against an in-memory
//! implementation and confines raw TL plumbing to [`crate::tg::facade`].

use async_trait::async_trait;

use crate::engine::filter;

/// Errors surfaced by the facade.
///
/// `FileMigrate` is recoverable and must be handled by switching the sender
/// to the indicated data center; it is a typed variant rather than a string
/// so the downloader can match on it.
#[derive(Debug, thiserror::Error)]
pub enum TgError {
    #[error("file migrated to dc {0}")]
    FileMigrate(i32),
    #[error("rpc error {code}: {name}")]
    Rpc { name: String, code: i32 },
    #[error("cannot resolve {0}")]
    Unresolved(String),
    #[error("{0}")]
    Other(String),
}

pub type TgResult<T> = Result<T, TgError>;

/// Opaque access token for a crawlable peer, as required by the RPC layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PeerHandle {
    /// The logged-in user's saved messages (`"me"` in the config).
    SavedMessages,
    Channel { channel_id: i64, access_hash: i64 },
    Chat { chat_id: i64 },
}

#[derive(Clone, Debug)]
pub struct DialogInfo {
    pub id: String,
    pub title: String,
    pub kind: &'static str,
    pub is_forum: bool,
}

#[derive(Clone, Debug)]
pub struct TopicInfo {
    pub id: i32,
    pub title: String,
}

/// A resolved channel: stable id, display title, RPC access and forum
/// metadata. Built once at startup and immutable afterwards.
#[derive(Clone, Debug)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub peer: PeerHandle,
    pub is_forum: bool,
    pub topics: Vec<TopicInfo>,
}

#[derive(Clone, Debug)]
pub struct RepliesInfo {
    pub count: i32,
    pub channel_id: Option<i64>,
}

/// The message subset the engine cares about.
///
/// Within one channel ids are strictly increasing; `is_comment` marks
/// messages harvested from a reply thread, which never advance the
/// channel checkpoint.
#[derive(Clone, Debug)]
pub struct MessageInfo {
    pub id: i32,
    pub date: i64,
    pub grouped_id: Option<i64>,
    pub topic_id: Option<i32>,
    pub media: Option<MediaInfo>,
    pub replies: Option<RepliesInfo>,
    pub is_comment: bool,
}

#[derive(Clone, Debug)]
pub enum MediaInfo {
    Photo(PhotoInfo),
    Document(DocumentInfo),
}

#[derive(Clone, Debug)]
pub enum PhotoSizeInfo {
    Plain { kind: String, bytes: i64 },
    /// Progressively-loaded size; the real byte size is the largest step.
    Progressive { kind: String, steps: Vec<i32> },
}

#[derive(Clone, Debug)]
pub struct PhotoInfo {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
    pub dc_id: i32,
    pub sizes: Vec<PhotoSizeInfo>,
}

#[derive(Clone, Debug)]
pub struct DocumentInfo {
    pub id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
    pub dc_id: i32,
    pub size: i64,
    pub mime_type: String,
    pub file_name: Option<String>,
    pub is_video: bool,
    pub is_audio: bool,
    /// Total number of document attributes, used to tell plain files apart.
    pub attr_count: usize,
}

/// What `upload.GetFile` needs to address a file's bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileLocation {
    Photo {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
        thumb_size: String,
    },
    Document {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
    },
}

impl PhotoInfo {
    /// The largest of the photo's sizes, by byte count.
    pub fn largest(&self) -> Option<&PhotoSizeInfo> {
        self.sizes.iter().max_by_key(|s| filter::photo_size_bytes(s))
    }

    pub fn byte_size(&self) -> Option<i64> {
        self.largest().map(filter::photo_size_bytes)
    }

    /// The thumb-size selector sent to `upload.GetFile`: the type string of
    /// the largest plain size, or empty when the largest is progressive.
    pub fn thumb_selector(&self) -> String {
        match self.largest() {
            Some(PhotoSizeInfo::Plain { kind, .. }) => kind.clone(),
            Some(PhotoSizeInfo::Progressive { .. }) | None => String::new(),
        }
    }
}

impl MediaInfo {
    pub fn dc_id(&self) -> i32 {
        match self {
            MediaInfo::Photo(p) => p.dc_id,
            MediaInfo::Document(d) => d.dc_id,
        }
    }

    pub fn byte_size(&self) -> Option<i64> {
        filter::media_size(self)
    }

    pub fn location(&self) -> FileLocation {
        match self {
            MediaInfo::Photo(p) => FileLocation::Photo {
                id: p.id,
                access_hash: p.access_hash,
                file_reference: p.file_reference.clone(),
                thumb_size: p.thumb_selector(),
            },
            MediaInfo::Document(d) => FileLocation::Document {
                id: d.id,
                access_hash: d.access_hash,
                file_reference: d.file_reference.clone(),
            },
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            MediaInfo::Photo(_) => Some("image/jpeg"),
            MediaInfo::Document(d) => Some(d.mime_type.as_str()),
        }
    }

    pub fn raw_file_name(&self) -> Option<&str> {
        match self {
            MediaInfo::Photo(_) => None,
            MediaInfo::Document(d) => d.file_name.as_deref(),
        }
    }
}

/// The RPC calls the engine needs, and nothing else.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// List the account's dialogs. Entries the server sends without a top
    /// message are skipped, never surfaced as errors.
    async fn dialogs(&self) -> TgResult<Vec<DialogInfo>>;

    /// Resolve a batch of channel ids. Fails as a whole on any bad id;
    /// callers isolate bad ids via [`resolve_channels`].
    async fn chats(&self, ids: &[String]) -> TgResult<Vec<ChannelInfo>>;

    /// Topics of a forum channel.
    async fn forum_topics(&self, peer: &PeerHandle) -> TgResult<Vec<TopicInfo>>;

    /// One page of channel history, newest first, with Telegram's raw
    /// `offset_id`/`add_offset` window semantics.
    async fn history(
        &self,
        peer: &PeerHandle,
        offset_id: i32,
        add_offset: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>>;

    /// One page of a message's reply thread, newest first.
    async fn replies(
        &self,
        peer: &PeerHandle,
        msg_id: i32,
        offset_id: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>>;

    /// Read one chunk of a file from the given data center. The per-DC
    /// sender is created lazily and cached by the implementation.
    async fn file_chunk(
        &self,
        dc_id: i32,
        location: &FileLocation,
        offset: i64,
        limit: i32,
    ) -> TgResult<Vec<u8>>;
}

/// Resolve channel ids, bisecting the list on batch errors so one corrupt
/// id cannot take down the whole selection. A failing single id is dropped
/// with a warning.
pub async fn resolve_channels(api: &dyn TelegramApi, ids: &[String]) -> Vec<ChannelInfo> {
    let mut resolved = Vec::new();
    let mut stack = vec![ids.to_vec()];
    while let Some(batch) = stack.pop() {
        if batch.is_empty() {
            continue;
        }
        match api.chats(&batch).await {
            Ok(mut chats) => resolved.append(&mut chats),
            Err(err) if batch.len() == 1 => {
                log::warn!("skipping unresolvable channel {}: {}", batch[0], err);
            }
            Err(_) => {
                let mid = batch.len() / 2;
                stack.push(batch[mid..].to_vec());
                stack.push(batch[..mid].to_vec());
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolves every id except the poisoned ones; any batch containing a
    /// poisoned id errors as a whole, like the real RPC does.
    struct BisectApi {
        poisoned: Vec<String>,
    }

    #[async_trait]
    impl TelegramApi for BisectApi {
        async fn dialogs(&self) -> TgResult<Vec<DialogInfo>> {
            Ok(vec![])
        }

        async fn chats(&self, ids: &[String]) -> TgResult<Vec<ChannelInfo>> {
            if let Some(bad) = ids.iter().find(|id| self.poisoned.contains(id)) {
                return Err(TgError::Unresolved(bad.clone()));
            }
            Ok(ids
                .iter()
                .map(|id| ChannelInfo {
                    id: id.clone(),
                    title: format!("title {id}"),
                    peer: PeerHandle::SavedMessages,
                    is_forum: false,
                    topics: vec![],
                })
                .collect())
        }

        async fn forum_topics(&self, _peer: &PeerHandle) -> TgResult<Vec<TopicInfo>> {
            Ok(vec![])
        }

        async fn history(
            &self,
            _peer: &PeerHandle,
            _offset_id: i32,
            _add_offset: i32,
            _limit: i32,
        ) -> TgResult<Vec<MessageInfo>> {
            Ok(vec![])
        }

        async fn replies(
            &self,
            _peer: &PeerHandle,
            _msg_id: i32,
            _offset_id: i32,
            _limit: i32,
        ) -> TgResult<Vec<MessageInfo>> {
            Ok(vec![])
        }

        async fn file_chunk(
            &self,
            _dc_id: i32,
            _location: &FileLocation,
            _offset: i64,
            _limit: i32,
        ) -> TgResult<Vec<u8>> {
            Ok(vec![])
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_all_good() {
        let api = BisectApi { poisoned: vec![] };
        let out = resolve_channels(&api, &ids(&["a", "b", "c"])).await;
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_isolates_bad_ids() {
        let api = BisectApi {
            poisoned: ids(&["c"]),
        };
        let out = resolve_channels(&api, &ids(&["a", "b", "c", "d", "e"])).await;
        let mut names: Vec<_> = out.into_iter().map(|c| c.id).collect();
        names.sort();
        assert_eq!(names, ids(&["a", "b", "d", "e"]));
    }

    #[tokio::test]
    async fn test_resolve_single_bad_id_is_empty() {
        let api = BisectApi {
            poisoned: ids(&["x"]),
        };
        let out = resolve_channels(&api, &ids(&["x"])).await;
        assert!(out.is_empty());
    }

    #[test]
    fn test_photo_largest_and_selector() {
        let photo = PhotoInfo {
            id: 1,
            access_hash: 2,
            file_reference: vec![1, 2, 3],
            dc_id: 2,
            sizes: vec![
                PhotoSizeInfo::Plain { kind: "m".to_string(), bytes: 512 },
                PhotoSizeInfo::Plain { kind: "x".to_string(), bytes: 2048 },
                PhotoSizeInfo::Plain { kind: "s".to_string(), bytes: 64 },
            ],
        };
        assert_eq!(photo.byte_size(), Some(2048));
        assert_eq!(photo.thumb_selector(), "x");

        let progressive = PhotoInfo {
            sizes: vec![
                PhotoSizeInfo::Plain { kind: "m".to_string(), bytes: 512 },
                PhotoSizeInfo::Progressive {
                    kind: "y".to_string(),
                    steps: vec![100, 4096, 900],
                },
            ],
            ..photo
        };
        assert_eq!(progressive.byte_size(), Some(4096));
        assert_eq!(progressive.thumb_selector(), "", "progressive sizes have no selector");
    }
}
