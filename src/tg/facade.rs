//! grammers-backed implementation of the RPC facade.
//!
//! All raw TL plumbing lives here: peer resolution through the dialog list,
//! raw `messages.GetHistory`/`GetReplies` paging, forum topics, and chunked
//! `upload.GetFile` reads routed to an explicit data center through the
//! sender pool (which lazily creates and reuses one sender per DC).

use std::collections::HashMap;

use async_trait::async_trait;
use grammers_client::types::Peer;
use grammers_client::Client;
use grammers_mtsender::InvocationError;
use grammers_tl_types as tl;
use tokio::sync::Mutex;

use crate::tg::api::{
    ChannelInfo, DialogInfo, DocumentInfo, FileLocation, MediaInfo, MessageInfo, PeerHandle,
    PhotoInfo, PhotoSizeInfo, RepliesInfo, TelegramApi, TgError, TgResult, TopicInfo,
};

/// Channel id of the saved-messages pseudo-channel in the config.
pub const SAVED_MESSAGES_ID: &str = "me";

struct PeerEntry {
    title: String,
    is_forum: bool,
    /// Channel-like peers carry an access hash; basic group chats don't.
    access_hash: Option<i64>,
    is_channel: bool,
}

pub struct ClientApi {
    client: Client,
    /// Lazily-built map from bare peer id to dialog metadata.
    peers: Mutex<Option<HashMap<i64, PeerEntry>>>,
}

impl ClientApi {
    pub fn new(client: Client) -> ClientApi {
        ClientApi {
            client,
            peers: Mutex::new(None),
        }
    }

    /// Walk the dialog list once and remember every channel-like peer.
    async fn ensure_peers(&self) -> TgResult<()> {
        let mut guard = self.peers.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let mut map = HashMap::new();
        let mut dialogs = self.client.iter_dialogs();
        loop {
            match dialogs.next().await {
                Ok(Some(dialog)) => {
                    // The server occasionally lists dialogs without a top
                    // message; those entries carry nothing usable.
                    if dialog.last_message.is_none() {
                        continue;
                    }
                    let peer = dialog.peer();
                    let id = peer.id().bare_id();
                    if let Some(entry) = peer_entry(peer) {
                        map.insert(id, entry);
                    }
                }
                Ok(None) => break,
                Err(err) => return Err(map_invocation(err)),
            }
        }
        *guard = Some(map);
        Ok(())
    }

    fn input_peer(&self, peer: &PeerHandle) -> tl::enums::InputPeer {
        match peer {
            PeerHandle::SavedMessages => tl::enums::InputPeer::PeerSelf,
            PeerHandle::Channel {
                channel_id,
                access_hash,
            } => tl::types::InputPeerChannel {
                channel_id: *channel_id,
                access_hash: *access_hash,
            }
            .into(),
            PeerHandle::Chat { chat_id } => tl::types::InputPeerChat { chat_id: *chat_id }.into(),
        }
    }

    async fn fetch_messages(
        &self,
        request: &impl tl::RemoteCall<Return = tl::enums::messages::Messages>,
    ) -> TgResult<Vec<MessageInfo>> {
        use tl::enums::messages::Messages;

        let raw = match self.client.invoke(request).await {
            Ok(Messages::Messages(m)) => m.messages,
            Ok(Messages::Slice(m)) => m.messages,
            Ok(Messages::ChannelMessages(m)) => m.messages,
            Ok(Messages::NotModified(_)) => Vec::new(),
            Err(err) => return Err(map_invocation(err)),
        };
        Ok(raw.into_iter().filter_map(convert_message).collect())
    }
}

#[async_trait]
impl TelegramApi for ClientApi {
    async fn dialogs(&self) -> TgResult<Vec<DialogInfo>> {
        let mut out = Vec::new();
        let mut dialogs = self.client.iter_dialogs();
        loop {
            match dialogs.next().await {
                Ok(Some(dialog)) => {
                    if dialog.last_message.is_none() {
                        continue;
                    }
                    let peer = dialog.peer();
                    out.push(DialogInfo {
                        id: peer.id().bare_id().to_string(),
                        title: peer_title(peer),
                        kind: peer_kind(peer),
                        is_forum: peer_is_forum(peer),
                    });
                }
                Ok(None) => break,
                Err(err) => return Err(map_invocation(err)),
            }
        }
        Ok(out)
    }

    async fn chats(&self, ids: &[String]) -> TgResult<Vec<ChannelInfo>> {
        let mut resolved = Vec::new();
        let mut channel_inputs: Vec<(String, i64, i64)> = Vec::new();

        for id in ids {
            if id == SAVED_MESSAGES_ID {
                resolved.push(ChannelInfo {
                    id: id.clone(),
                    title: "Saved Messages".to_string(),
                    peer: PeerHandle::SavedMessages,
                    is_forum: false,
                    topics: Vec::new(),
                });
                continue;
            }
            let bare: i64 = id
                .parse()
                .map_err(|_| TgError::Unresolved(id.clone()))?;
            self.ensure_peers().await?;
            let guard = self.peers.lock().await;
            let entry = guard
                .as_ref()
                .and_then(|peers| peers.get(&bare))
                .ok_or_else(|| TgError::Unresolved(id.clone()))?;
            if entry.is_channel {
                channel_inputs.push((id.clone(), bare, entry.access_hash.unwrap_or_default()));
            } else {
                resolved.push(ChannelInfo {
                    id: id.clone(),
                    title: entry.title.clone(),
                    peer: PeerHandle::Chat { chat_id: bare },
                    is_forum: false,
                    topics: Vec::new(),
                });
            }
        }

        if channel_inputs.is_empty() {
            return Ok(resolved);
        }

        // Fetch fresh descriptors for the whole channel batch at once;
        // callers bisect on failure.
        let request = tl::functions::channels::GetChannels {
            id: channel_inputs
                .iter()
                .map(|(_, channel_id, access_hash)| {
                    tl::types::InputChannel {
                        channel_id: *channel_id,
                        access_hash: *access_hash,
                    }
                    .into()
                })
                .collect(),
        };
        let chats = match self.client.invoke(&request).await {
            Ok(tl::enums::messages::Chats::Chats(c)) => c.chats,
            Ok(tl::enums::messages::Chats::Slice(c)) => c.chats,
            Err(err) => return Err(map_invocation(err)),
        };
        for chat in chats {
            if let tl::enums::Chat::Channel(channel) = chat {
                let Some((id, _, cached_hash)) = channel_inputs
                    .iter()
                    .find(|(_, channel_id, _)| *channel_id == channel.id)
                else {
                    continue;
                };
                resolved.push(ChannelInfo {
                    id: id.clone(),
                    title: channel.title.clone(),
                    peer: PeerHandle::Channel {
                        channel_id: channel.id,
                        access_hash: channel.access_hash.unwrap_or(*cached_hash),
                    },
                    is_forum: channel.forum,
                    topics: Vec::new(),
                });
            }
        }
        Ok(resolved)
    }

    async fn forum_topics(&self, peer: &PeerHandle) -> TgResult<Vec<TopicInfo>> {
        let PeerHandle::Channel {
            channel_id,
            access_hash,
        } = peer
        else {
            return Ok(Vec::new());
        };
        let request = tl::functions::channels::GetForumTopics {
            channel: tl::types::InputChannel {
                channel_id: *channel_id,
                access_hash: *access_hash,
            }
            .into(),
            q: None,
            offset_date: 0,
            offset_id: 0,
            offset_topic: 0,
            limit: 100,
        };
        let topics = match self.client.invoke(&request).await {
            Ok(tl::enums::messages::ForumTopics::Topics(t)) => t.topics,
            Err(err) => return Err(map_invocation(err)),
        };
        Ok(topics
            .into_iter()
            .filter_map(|topic| match topic {
                tl::enums::ForumTopic::Topic(t) => Some(TopicInfo {
                    id: t.id,
                    title: t.title,
                }),
                _ => None,
            })
            .collect())
    }

    async fn history(
        &self,
        peer: &PeerHandle,
        offset_id: i32,
        add_offset: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>> {
        let request = tl::functions::messages::GetHistory {
            peer: self.input_peer(peer),
            offset_id,
            offset_date: 0,
            add_offset,
            limit,
            max_id: 0,
            min_id: 0,
            hash: 0,
        };
        self.fetch_messages(&request).await
    }

    async fn replies(
        &self,
        peer: &PeerHandle,
        msg_id: i32,
        offset_id: i32,
        limit: i32,
    ) -> TgResult<Vec<MessageInfo>> {
        let request = tl::functions::messages::GetReplies {
            peer: self.input_peer(peer),
            msg_id,
            offset_id,
            offset_date: 0,
            add_offset: 0,
            limit,
            max_id: 0,
            min_id: 0,
            hash: 0,
        };
        self.fetch_messages(&request).await
    }

    async fn file_chunk(
        &self,
        dc_id: i32,
        location: &FileLocation,
        offset: i64,
        limit: i32,
    ) -> TgResult<Vec<u8>> {
        let location = match location {
            FileLocation::Photo {
                id,
                access_hash,
                file_reference,
                thumb_size,
            } => tl::types::InputPhotoFileLocation {
                id: *id,
                access_hash: *access_hash,
                file_reference: file_reference.clone(),
                thumb_size: thumb_size.clone(),
            }
            .into(),
            FileLocation::Document {
                id,
                access_hash,
                file_reference,
            } => tl::types::InputDocumentFileLocation {
                id: *id,
                access_hash: *access_hash,
                file_reference: file_reference.clone(),
                thumb_size: String::new(),
            }
            .into(),
        };
        let request = tl::functions::upload::GetFile {
            precise: true,
            cdn_supported: false,
            location,
            offset,
            limit,
        };
        match self.client.invoke_in_dc(dc_id, &request).await {
            Ok(tl::enums::upload::File::File(file)) => Ok(file.bytes),
            Ok(tl::enums::upload::File::CdnRedirect(_)) => {
                Err(TgError::Other("unexpected CDN redirect".to_string()))
            }
            Err(err) => Err(map_invocation(err)),
        }
    }
}

/// Translate grammers errors into the engine's taxonomy, pulling
/// `FILE_MIGRATE` out as its own recoverable variant.
fn map_invocation(err: InvocationError) -> TgError {
    match err {
        InvocationError::Rpc(rpc) if rpc.name == "FILE_MIGRATE" => match rpc.value {
            Some(dc) => TgError::FileMigrate(dc as i32),
            None => TgError::Rpc {
                name: rpc.name,
                code: rpc.code,
            },
        },
        InvocationError::Rpc(rpc) => TgError::Rpc {
            name: rpc.name,
            code: rpc.code,
        },
        other => TgError::Other(other.to_string()),
    }
}

fn peer_entry(peer: &Peer) -> Option<PeerEntry> {
    match peer {
        Peer::User(_) => None,
        Peer::Group(group) => {
            let (is_channel, is_forum, access_hash) = match &group.raw {
                tl::enums::Chat::Channel(channel) => (true, channel.forum, channel.access_hash),
                _ => (false, false, None),
            };
            Some(PeerEntry {
                title: group.title().unwrap_or_default().to_string(),
                is_forum,
                access_hash,
                is_channel,
            })
        }
        Peer::Channel(channel) => Some(PeerEntry {
            title: channel.title().to_string(),
            is_forum: channel.raw.forum,
            access_hash: channel.raw.access_hash,
            is_channel: true,
        }),
    }
}

fn peer_title(peer: &Peer) -> String {
    peer.name().unwrap_or_default().to_string()
}

fn peer_kind(peer: &Peer) -> &'static str {
    match peer {
        Peer::User(_) => "user",
        Peer::Group(_) => "group",
        Peer::Channel(_) => "channel",
    }
}

fn peer_is_forum(peer: &Peer) -> bool {
    match peer {
        Peer::User(_) => false,
        Peer::Group(group) => matches!(&group.raw, tl::enums::Chat::Channel(c) if c.forum),
        Peer::Channel(channel) => channel.raw.forum,
    }
}

/// Map a raw message into the engine's descriptor. Service messages keep
/// their id with no media (the checkpoint must move past them); empty
/// messages disappear.
fn convert_message(raw: tl::enums::Message) -> Option<MessageInfo> {
    match raw {
        tl::enums::Message::Message(m) => {
            let topic_id = extract_topic_id(m.reply_to.as_ref());
            let replies = m.replies.map(|replies| {
                let tl::enums::MessageReplies::Replies(r) = replies;
                RepliesInfo {
                    count: r.replies,
                    channel_id: r.channel_id,
                }
            });
            Some(MessageInfo {
                id: m.id,
                date: m.date as i64,
                grouped_id: m.grouped_id,
                topic_id,
                media: m.media.and_then(convert_media),
                replies,
                is_comment: false,
            })
        }
        tl::enums::Message::Service(m) => Some(MessageInfo {
            id: m.id,
            date: m.date as i64,
            grouped_id: None,
            topic_id: extract_topic_id(m.reply_to.as_ref()),
            media: None,
            replies: None,
            is_comment: false,
        }),
        tl::enums::Message::Empty(_) => None,
    }
}

/// Forum topic id from a reply header: `reply_to_top_id` when present, the
/// replied-to message for direct topic posts.
fn extract_topic_id(reply_to: Option<&tl::enums::MessageReplyHeader>) -> Option<i32> {
    if let Some(tl::enums::MessageReplyHeader::Header(header)) = reply_to {
        if let Some(top_id) = header.reply_to_top_id {
            return Some(top_id);
        }
        if header.forum_topic {
            return header.reply_to_msg_id;
        }
    }
    None
}

fn convert_media(media: tl::enums::MessageMedia) -> Option<MediaInfo> {
    match media {
        tl::enums::MessageMedia::Photo(tl::types::MessageMediaPhoto {
            photo: Some(tl::enums::Photo::Photo(photo)),
            ..
        }) => Some(MediaInfo::Photo(PhotoInfo {
            id: photo.id,
            access_hash: photo.access_hash,
            file_reference: photo.file_reference,
            dc_id: photo.dc_id,
            sizes: photo
                .sizes
                .into_iter()
                .filter_map(convert_photo_size)
                .collect(),
        })),
        tl::enums::MessageMedia::Document(tl::types::MessageMediaDocument {
            document: Some(tl::enums::Document::Document(doc)),
            ..
        }) => {
            let mut file_name = None;
            let mut is_video = false;
            let mut is_audio = false;
            for attribute in &doc.attributes {
                match attribute {
                    tl::enums::DocumentAttribute::Video(_) => is_video = true,
                    tl::enums::DocumentAttribute::Audio(_) => is_audio = true,
                    tl::enums::DocumentAttribute::Filename(f) => {
                        file_name = Some(f.file_name.clone());
                    }
                    _ => {}
                }
            }
            Some(MediaInfo::Document(DocumentInfo {
                id: doc.id,
                access_hash: doc.access_hash,
                file_reference: doc.file_reference,
                dc_id: doc.dc_id,
                size: doc.size,
                mime_type: doc.mime_type,
                file_name,
                is_video,
                is_audio,
                attr_count: doc.attributes.len(),
            }))
        }
        _ => None,
    }
}

fn convert_photo_size(size: tl::enums::PhotoSize) -> Option<PhotoSizeInfo> {
    match size {
        tl::enums::PhotoSize::Size(s) => Some(PhotoSizeInfo::Plain {
            kind: s.r#type,
            bytes: s.size as i64,
        }),
        tl::enums::PhotoSize::Progressive(p) => Some(PhotoSizeInfo::Progressive {
            kind: p.r#type,
            steps: p.sizes,
        }),
        _ => None,
    }
}
