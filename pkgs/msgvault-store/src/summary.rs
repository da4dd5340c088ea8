//! Chat list summaries and how they are derived from messages

use crate::jid::Jid;
use crate::message::{MessageBody, MessageInfo};
use crate::ttl_cache::TtlCache;
use serde::{Deserialize, Serialize};

/// Sender label shown for messages authored by the local account
pub const SELF_SENDER_LABEL: &str = "You";

/// Latest-message cache keyed by chat key (the chat JID's user part)
pub type ChatSummaryCache = TtlCache<String, ChatSummary>;

/// What the chat list shows for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub jid: Jid,
    pub message_text: String,
    /// Epoch seconds of the latest message
    pub message_time: i64,
    pub sender: String,
    /// Unread inbound messages this session, filled in by the chat list query
    pub unread_count: usize,
}

impl ChatSummary {
    /// Summarize the message described by `info` and `body`
    pub fn from_message(info: &MessageInfo, body: &MessageBody) -> Self {
        Self {
            jid: info.chat.clone(),
            message_text: extract_message_text(body),
            message_time: info.unix_timestamp(),
            sender: sender_label(info),
            unread_count: 0,
        }
    }
}

/// Text representation of a message body for list views
pub fn extract_message_text(body: &MessageBody) -> String {
    if let Some(text) = body.conversation.as_deref().filter(|t| !t.is_empty()) {
        return text.to_string();
    }
    if let Some(ext) = &body.extended_text {
        return ext.text.clone();
    }

    let label = if body.image.is_some() {
        "image"
    } else if body.video.is_some() {
        "video"
    } else if body.audio.is_some() {
        "audio"
    } else if body.document.is_some() {
        "document"
    } else if body.sticker.is_some() {
        "sticker"
    } else {
        "message"
    };
    label.to_string()
}

/// Who the chat list credits with the message
pub fn sender_label(info: &MessageInfo) -> String {
    if info.is_from_me {
        return SELF_SENDER_LABEL.to_string();
    }
    if !info.push_name.is_empty() {
        return info.push_name.clone();
    }
    info.sender.user.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ExtendedText, MediaRef, MessageEvent};

    fn media() -> Option<MediaRef> {
        Some(MediaRef::new("https://mmg.example/x", "application/octet-stream"))
    }

    #[test]
    fn test_conversation_wins() {
        let body = MessageBody {
            conversation: Some("hello".into()),
            extended_text: Some(ExtendedText {
                text: "quoted".into(),
                context: None,
            }),
            image: media(),
            ..Default::default()
        };
        assert_eq!(extract_message_text(&body), "hello");
    }

    #[test]
    fn test_empty_conversation_falls_through_to_extended_text() {
        let body = MessageBody {
            conversation: Some(String::new()),
            ..MessageBody::reply("see above", "m0")
        };
        assert_eq!(extract_message_text(&body), "see above");
    }

    #[test]
    fn test_media_label_precedence() {
        let mut body = MessageBody {
            image: media(),
            video: media(),
            audio: media(),
            document: media(),
            sticker: media(),
            ..Default::default()
        };
        let mut labels = Vec::new();
        for _ in 0..5 {
            labels.push(extract_message_text(&body));
            if body.image.take().is_some() {
                continue;
            }
            if body.video.take().is_some() {
                continue;
            }
            if body.audio.take().is_some() {
                continue;
            }
            body.document.take();
        }
        assert_eq!(labels, ["image", "video", "audio", "document", "sticker"]);
    }

    #[test]
    fn test_fallback_label() {
        assert_eq!(extract_message_text(&MessageBody::default()), "message");
    }

    #[test]
    fn test_sender_label_rules() {
        let event = MessageEvent::new(
            Jid::new("c1", "g.us"),
            Jid::new("15550001", "s.whatsapp.net"),
            "m1",
            100,
            MessageBody::text("hi"),
        );
        assert_eq!(sender_label(&event.info), "15550001");

        let named = event.clone().with_push_name("Alice");
        assert_eq!(sender_label(&named.info), "Alice");

        let mine = named.from_me();
        assert_eq!(sender_label(&mine.info), SELF_SENDER_LABEL);
    }

    #[test]
    fn test_summary_from_message() {
        let event = MessageEvent::new(
            Jid::new("c1", "g.us"),
            Jid::new("bob", "s.whatsapp.net"),
            "m1",
            1_700_000_000,
            MessageBody::text("hi"),
        );
        let summary = ChatSummary::from_message(&event.info, &event.message);
        assert_eq!(summary.jid, Jid::new("c1", "g.us"));
        assert_eq!(summary.message_text, "hi");
        assert_eq!(summary.message_time, 1_700_000_000);
        assert_eq!(summary.sender, "bob");
    }
}
