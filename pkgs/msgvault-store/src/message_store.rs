//! Message store - persistent storage for messages using SQLite
//!
//! Ingestion and queries are best-effort: storage and decode failures are
//! logged and surface as missing data, never as errors or panics.

use crate::codec::MessageCodec;
use crate::dedup::{DedupGuard, Sighting};
use crate::error::Result;
use crate::jid::Jid;
use crate::message::{Message, MessageBody, MessageEvent, MessageInfo};
use crate::queries;
use crate::summary::{extract_message_text, sender_label, ChatSummary, ChatSummaryCache};
use crate::ttl_cache::TtlConfig;
use crate::two_level_map::TwoLevelMap;
use crate::StoreConfig;
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension, Params};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

/// Encoded (metadata, body) columns of one row
type RawMessage = (Vec<u8>, Vec<u8>);

/// Row of the chat list query
struct ChatRow {
    chat: String,
    timestamp: i64,
    info: Vec<u8>,
    raw: Vec<u8>,
}

/// Message store - durable history plus the chat list cache
pub struct MessageStore {
    db: Mutex<rusqlite::Connection>,
    codec: MessageCodec,
    /// [chat key] = latest summary
    chat_list: ChatSummaryCache,
    seen: DedupGuard,
    /// [chat key][message id] = timestamp of unread inbound messages
    unread: TwoLevelMap<String, String, i64>,
    config: StoreConfig,
}

impl MessageStore {
    /// Create a new message store with default config
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::with_config(StoreConfig {
            db_path,
            ..Default::default()
        })
    }

    /// Create a message store with custom config
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        let conn = rusqlite::Connection::open(&config.db_path)?;
        info!("Message store initialized at {}", config.db_path.display());
        Self::with_connection(conn, config)
    }

    /// Store backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        debug!("Message store initialized in memory");
        Self::with_connection(conn, StoreConfig::default())
    }

    /// Create a message store on an existing connection
    pub fn with_connection(conn: rusqlite::Connection, config: StoreConfig) -> Result<Self> {
        Self::init_schema(&conn)?;

        let sweep_interval = config.summary_sweep_interval();
        let chat_list = ChatSummaryCache::new(TtlConfig {
            ttl: config.summary_ttl(),
            revalidate: true,
            sweep_interval: (!sweep_interval.is_zero()).then_some(sweep_interval),
        });

        Ok(Self {
            db: Mutex::new(conn),
            codec: MessageCodec::new(),
            chat_list,
            seen: DedupGuard::with_capacity(config.dedup_capacity),
            unread: TwoLevelMap::new(),
            config,
        })
    }

    fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
        conn.execute_batch(queries::CREATE_SCHEMA)?;
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Ingest one inbound message event.
    ///
    /// Refreshes the chat list cache, then inserts the message or, for an id
    /// already seen this session, overwrites the stored row.
    pub fn process_message_event(&self, event: &MessageEvent) {
        let info = &event.info;
        let chat_key = info.chat.chat_key().to_string();

        let summary = ChatSummary::from_message(info, &event.message);
        self.chat_list.set(chat_key.clone(), summary);

        if !info.is_from_me {
            self.unread.set(chat_key, info.id.clone(), info.unix_timestamp());
        }

        let result = match self.seen.check_and_mark(&info.id) {
            Sighting::Repeat => self.update_message_in_db(info, &event.message),
            Sighting::First => self.insert_message_to_db(info, &event.message),
        };

        match result {
            Ok(()) => debug!("Stored message {} in {}", info.id, info.chat),
            Err(e) => warn!("Dropping message {} in {}: {}", info.id, info.chat, e),
        }
    }

    /// Page of history for `chat`, oldest first.
    ///
    /// `before_timestamp == 0` returns the latest `limit` messages, otherwise
    /// up to `limit` messages strictly older than `before_timestamp`.
    pub fn get_messages_paged(
        &self,
        chat: &Jid,
        before_timestamp: i64,
        limit: usize,
    ) -> Vec<Message> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let chat_str = chat.to_string();

        let rows = if before_timestamp == 0 {
            self.query_message_rows(
                queries::SELECT_LATEST_MESSAGES_BY_CHAT,
                params![chat_str, limit],
            )
        } else {
            self.query_message_rows(
                queries::SELECT_MESSAGES_BY_CHAT_BEFORE_TIMESTAMP,
                params![chat_str, before_timestamp, limit],
            )
        };

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to load messages for {}: {}", chat, e);
                return Vec::new();
            }
        };

        let mut messages: Vec<Message> = rows
            .iter()
            .filter_map(|(info, raw)| self.decode_or_skip(info, raw))
            .collect();

        // Queries return newest first
        messages.reverse();
        messages.sort_by_key(|m| m.info.timestamp);
        messages
    }

    /// Latest page using the configured page size
    pub fn get_latest_messages(&self, chat: &Jid) -> Vec<Message> {
        self.get_messages_paged(chat, 0, self.config.default_page_size)
    }

    pub fn get_message(&self, chat: &Jid, message_id: &str) -> Option<Message> {
        let row: Option<RawMessage> = {
            let db = self.db.lock();
            let row = db
                .query_row(
                    queries::SELECT_MESSAGE_BY_CHAT_AND_ID,
                    params![chat.to_string(), message_id],
                    |row| -> rusqlite::Result<RawMessage> { Ok((row.get(0)?, row.get(1)?)) },
                )
                .optional()
                .map_err(|e| warn!("Failed to load message {} in {}: {}", message_id, chat, e))
                .ok()
                .flatten();
            row
        };

        let (info, raw) = row?;
        self.decode_or_skip(&info, &raw)
    }

    /// Look a message up by id across all chats, e.g. to resolve a quote
    pub fn get_message_by_id(&self, message_id: &str) -> Option<Message> {
        let row: Option<RawMessage> = {
            let db = self.db.lock();
            let row = db
                .query_row(
                    queries::SELECT_MESSAGE_BY_ID,
                    params![message_id],
                    |row| -> rusqlite::Result<RawMessage> { Ok((row.get(3)?, row.get(4)?)) },
                )
                .optional()
                .map_err(|e| warn!("Failed to load message {}: {}", message_id, e))
                .ok()
                .flatten();
            row
        };

        let (info, raw) = row?;
        self.decode_or_skip(&info, &raw)
    }

    /// The message quoted by `message`, if it has been stored
    pub fn resolve_quoted(&self, message: &Message) -> Option<Message> {
        let quoted_id = message.content.quoted_id()?;
        self.get_message_by_id(quoted_id)
    }

    /// One summary per stored chat, most recently active first
    pub fn get_chat_list(&self) -> Vec<ChatSummary> {
        let rows = match self.query_chat_rows() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to load chat list: {}", e);
                return Vec::new();
            }
        };

        let mut chat_list = Vec::with_capacity(rows.len());
        for row in rows {
            let jid = match Jid::parse(&row.chat) {
                Ok(jid) => jid,
                Err(e) => {
                    trace!("Skipping chat row: {}", e);
                    continue;
                }
            };

            let summary = match self.chat_list.get(&jid.chat_key().to_string()) {
                Some(cached) => cached,
                None => {
                    let Some(message) = self.decode_or_skip(&row.info, &row.raw) else {
                        continue;
                    };
                    let summary = ChatSummary {
                        jid: jid.clone(),
                        message_text: extract_message_text(&message.content),
                        message_time: row.timestamp,
                        sender: sender_label(&message.info),
                        unread_count: 0,
                    };
                    self.chat_list.set(jid.chat_key().to_string(), summary.clone());
                    summary
                }
            };

            chat_list.push(ChatSummary {
                unread_count: self.unread_count(&jid),
                ..summary
            });
        }

        chat_list
    }

    /// Summary for a single chat, from the cache or the latest stored row
    pub fn chat_summary(&self, chat: &Jid) -> Option<ChatSummary> {
        let key = chat.chat_key().to_string();
        let summary = match self.chat_list.get(&key) {
            Some(cached) => cached,
            None => {
                let latest = self.get_messages_paged(chat, 0, 1).pop()?;
                let summary = ChatSummary::from_message(&latest.info, &latest.content);
                self.chat_list.set(key, summary.clone());
                summary
            }
        };

        Some(ChatSummary {
            unread_count: self.unread_count(chat),
            ..summary
        })
    }

    /// Unread inbound messages in `chat` this session
    pub fn unread_count(&self, chat: &Jid) -> usize {
        self.unread.inner_len(&chat.chat_key().to_string())
    }

    /// Unread counts keyed by chat key
    pub fn unread_counts(&self) -> HashMap<String, usize> {
        self.unread.with_read(|chats| {
            chats
                .iter()
                .map(|(chat, ids)| (chat.clone(), ids.len()))
                .collect()
        })
    }

    /// Clear all unread messages of a chat, returning how many were cleared
    pub fn mark_chat_read(&self, chat: &Jid) -> usize {
        self.unread
            .delete(&chat.chat_key().to_string())
            .map_or(0, |ids| ids.len())
    }

    pub fn mark_message_read(&self, chat: &Jid, message_id: &str) -> bool {
        self.unread
            .delete_inner(&chat.chat_key().to_string(), &message_id.to_string())
            .is_some()
    }

    /// Number of stored rows for `chat`
    pub fn count_messages(&self, chat: &Jid) -> usize {
        let db = self.db.lock();
        let count = db
            .query_row(
                queries::COUNT_MESSAGES_BY_CHAT,
                params![chat.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| usize::try_from(count).unwrap_or(0))
            .unwrap_or_else(|e| {
                warn!("Failed to count messages in {}: {}", chat, e);
                0
            });
        count
    }

    fn insert_message_to_db(&self, info: &MessageInfo, body: &MessageBody) -> Result<()> {
        let msg_info = self.codec.encode_info(info)?;
        let raw = self.codec.encode_body(body)?;

        let db = self.db.lock();
        db.execute(
            queries::INSERT_MESSAGE,
            params![
                info.chat.to_string(),
                info.id,
                info.unix_timestamp(),
                msg_info,
                raw,
            ],
        )?;
        Ok(())
    }

    fn update_message_in_db(&self, info: &MessageInfo, body: &MessageBody) -> Result<()> {
        let msg_info = self.codec.encode_info(info)?;
        let raw = self.codec.encode_body(body)?;

        let updated = {
            let db = self.db.lock();
            db.execute(queries::UPDATE_MESSAGE, params![msg_info, raw, info.id])?
        };

        if updated == 0 {
            // The first insert never landed; store it now
            debug!("No row to update for {}, inserting", info.id);
            return self.insert_message_to_db(info, body);
        }
        Ok(())
    }

    fn query_message_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<RawMessage>> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, |row| -> rusqlite::Result<RawMessage> {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .filter_map(|row| {
                row.map_err(|e| trace!("Skipping unreadable row: {}", e)).ok()
            })
            .collect();
        Ok(rows)
    }

    fn query_chat_rows(&self) -> Result<Vec<ChatRow>> {
        let db = self.db.lock();
        let mut stmt = db.prepare_cached(queries::SELECT_CHAT_LIST)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ChatRow {
                    chat: row.get(0)?,
                    timestamp: row.get(1)?,
                    info: row.get(2)?,
                    raw: row.get(3)?,
                })
            })?
            .filter_map(|row| {
                row.map_err(|e| trace!("Skipping unreadable chat row: {}", e))
                    .ok()
            })
            .collect();
        Ok(rows)
    }

    fn decode_message(&self, info: &[u8], raw: &[u8]) -> Result<Message> {
        Ok(Message {
            info: self.codec.decode_info(info)?,
            content: self.codec.decode_body(raw)?,
        })
    }

    fn decode_or_skip(&self, info: &[u8], raw: &[u8]) -> Option<Message> {
        self.decode_message(info, raw)
            .map_err(|e| trace!("Skipping undecodable message: {}", e))
            .ok()
    }
}
