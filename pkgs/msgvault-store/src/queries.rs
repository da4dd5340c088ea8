//! Parameterized SQL used by the message store

pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    chat TEXT NOT NULL,
    message_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    msg_info BLOB NOT NULL,
    raw BLOB NOT NULL,
    PRIMARY KEY (chat, message_id)
);
CREATE INDEX IF NOT EXISTS idx_messages_chat_timestamp ON messages(chat, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_messages_message_id ON messages(message_id);
"#;

/// ?1 chat, ?2 message id, ?3 timestamp, ?4 metadata, ?5 body
pub const INSERT_MESSAGE: &str = r#"
INSERT INTO messages (chat, message_id, timestamp, msg_info, raw)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(chat, message_id) DO UPDATE SET
    timestamp = excluded.timestamp,
    msg_info = excluded.msg_info,
    raw = excluded.raw
"#;

/// ?1 metadata, ?2 body, ?3 message id
pub const UPDATE_MESSAGE: &str =
    "UPDATE messages SET msg_info = ?1, raw = ?2 WHERE message_id = ?3";

/// ?1 chat, ?2 limit. Newest first.
pub const SELECT_LATEST_MESSAGES_BY_CHAT: &str = r#"
SELECT msg_info, raw, timestamp FROM messages
WHERE chat = ?1
ORDER BY timestamp DESC, rowid DESC
LIMIT ?2
"#;

/// ?1 chat, ?2 exclusive upper timestamp bound, ?3 limit. Newest first.
pub const SELECT_MESSAGES_BY_CHAT_BEFORE_TIMESTAMP: &str = r#"
SELECT msg_info, raw, timestamp FROM messages
WHERE chat = ?1 AND timestamp < ?2
ORDER BY timestamp DESC, rowid DESC
LIMIT ?3
"#;

/// ?1 chat, ?2 message id
pub const SELECT_MESSAGE_BY_CHAT_AND_ID: &str =
    "SELECT msg_info, raw FROM messages WHERE chat = ?1 AND message_id = ?2";

/// ?1 message id
pub const SELECT_MESSAGE_BY_ID: &str = r#"
SELECT chat, message_id, timestamp, msg_info, raw FROM messages
WHERE message_id = ?1
ORDER BY timestamp DESC
LIMIT 1
"#;

/// Latest row of every chat, most recently active chat first.
/// SQLite returns the bare columns from the row holding MAX(timestamp).
pub const SELECT_CHAT_LIST: &str = r#"
SELECT chat, MAX(timestamp) AS latest, msg_info, raw FROM messages
GROUP BY chat
ORDER BY latest DESC
"#;

/// ?1 chat
pub const COUNT_MESSAGES_BY_CHAT: &str = "SELECT COUNT(*) FROM messages WHERE chat = ?1";
