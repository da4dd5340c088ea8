//! Message types flowing through the store

use crate::jid::Jid;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Server part of group chat addresses
pub const GROUP_SERVER: &str = "g.us";

/// Message metadata as delivered by the connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub chat: Jid,
    pub sender: Jid,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_me: bool,
    pub is_group: bool,
    /// Display name advertised by the sender, may be empty
    pub push_name: String,
}

impl MessageInfo {
    /// Timestamp in whole epoch seconds, as stored in the messages table
    pub fn unix_timestamp(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// Reference to another message being quoted or replied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteContext {
    pub stanza_id: String,
    pub participant: Option<Jid>,
}

/// Text body with optional quote context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedText {
    pub text: String,
    pub context: Option<QuoteContext>,
}

/// Media attachment reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub mimetype: String,
    pub caption: Option<String>,
    pub file_length: u64,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mimetype: mimetype.into(),
            caption: None,
            file_length: 0,
        }
    }
}

/// Protocol message body.
///
/// Any combination of parts may be set; what a chat list displays is decided
/// by [`crate::summary::extract_message_text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedText>,
    pub image: Option<MediaRef>,
    pub video: Option<MediaRef>,
    pub audio: Option<MediaRef>,
    pub document: Option<MediaRef>,
    pub sticker: Option<MediaRef>,
}

impl MessageBody {
    /// Plain conversation text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            ..Default::default()
        }
    }

    /// Reply quoting the message with `stanza_id`
    pub fn reply(text: impl Into<String>, stanza_id: impl Into<String>) -> Self {
        Self {
            extended_text: Some(ExtendedText {
                text: text.into(),
                context: Some(QuoteContext {
                    stanza_id: stanza_id.into(),
                    participant: None,
                }),
            }),
            ..Default::default()
        }
    }

    /// Id of the message this body quotes, if any
    pub fn quoted_id(&self) -> Option<&str> {
        self.extended_text
            .as_ref()
            .and_then(|ext| ext.context.as_ref())
            .map(|ctx| ctx.stanza_id.as_str())
    }
}

/// A stored message: metadata plus body
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub info: MessageInfo,
    pub content: MessageBody,
}

/// Inbound message event from the connection
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub info: MessageInfo,
    pub message: MessageBody,
}

impl MessageEvent {
    /// Build an event for a message received in `chat` at `timestamp` seconds.
    /// Chats on [`GROUP_SERVER`] are marked as groups.
    pub fn new(
        chat: Jid,
        sender: Jid,
        id: impl Into<String>,
        timestamp: i64,
        message: MessageBody,
    ) -> Self {
        let is_group = chat.server == GROUP_SERVER;
        Self {
            info: MessageInfo {
                chat,
                sender,
                id: id.into(),
                timestamp: timestamp_from_secs(timestamp),
                is_from_me: false,
                is_group,
                push_name: String::new(),
            },
            message,
        }
    }

    pub fn from_me(mut self) -> Self {
        self.info.is_from_me = true;
        self
    }

    pub fn with_group(mut self, is_group: bool) -> Self {
        self.info.is_group = is_group;
        self
    }

    pub fn with_push_name(mut self, push_name: impl Into<String>) -> Self {
        self.info.push_name = push_name.into();
        self
    }

    pub fn into_message(self) -> Message {
        Message {
            info: self.info,
            content: self.message,
        }
    }
}

/// Seconds outside chrono's range saturate at its bounds
fn timestamp_from_secs(secs: i64) -> DateTime<Utc> {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(ts) => ts,
        None if secs < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}
