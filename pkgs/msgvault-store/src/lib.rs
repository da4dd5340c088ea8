//! Msgvault Store - message persistence and chat list caching
//!
//! This crate stores chat messages durably in SQLite, serves paginated and
//! point history queries, and keeps a time-bounded cache of every chat's
//! latest message for list rendering.
//!
//! # Architecture
//!
//! - **MessageStore**: owns the database connection and both caches; exposes
//!   ingestion and queries
//! - **ChatSummaryCache**: TTL cache of each chat's latest message, with
//!   sliding expiration and a background sweep
//! - **DedupGuard**: session memory of ingested message ids, deciding between
//!   the insert and the update path
//! - **TwoLevelMap**: concurrent chat -> message -> value map, used for
//!   unread tracking
//! - **MessageCodec**: schema-tagged metadata and body encodings
//!
//! # Failure model
//!
//! Only construction returns errors. Ingestion drops events it cannot
//! persist, and queries treat unreadable rows as missing; both log through
//! `tracing`.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use msgvault_store::{Jid, MessageBody, MessageEvent, MessageStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MessageStore::new("msgvault.db".into())?;
//! let chat = Jid::parse("family@g.us")?;
//!
//! store.process_message_event(&MessageEvent::new(
//!     chat.clone(),
//!     Jid::parse("alice@s.whatsapp.net")?,
//!     "3EB0C431C26A1916E1A1",
//!     1_700_000_000,
//!     MessageBody::text("Hello!"),
//! ));
//!
//! let page = store.get_messages_paged(&chat, 0, 50);
//! let chats = store.get_chat_list();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod dedup;
pub mod error;
pub mod jid;
pub mod message;
pub mod message_store;
pub mod queries;
pub mod summary;
pub mod ttl_cache;
pub mod two_level_map;

pub use codec::MessageCodec;
pub use dedup::{DedupGuard, Sighting};
pub use error::{Result, StoreError};
pub use jid::Jid;
pub use message::{
    ExtendedText, MediaRef, Message, MessageBody, MessageEvent, MessageInfo, QuoteContext,
    GROUP_SERVER,
};
pub use message_store::MessageStore;
pub use summary::{
    extract_message_text, sender_label, ChatSummary, ChatSummaryCache, SELF_SENDER_LABEL,
};
pub use ttl_cache::{TtlCache, TtlConfig};
pub use two_level_map::TwoLevelMap;

use std::time::Duration;

/// Default page size for history queries
pub const MAX_MESSAGE_CACHE_SIZE: usize = 50;

/// Configuration for the message store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: std::path::PathBuf,

    /// Idle lifetime of a chat list cache entry in seconds (default: 600s)
    pub summary_ttl_seconds: u64,

    /// Interval in seconds between sweeps of the chat list cache (default: 900s)
    pub summary_sweep_interval_seconds: u64,

    /// Maximum number of remembered message ids, `None` for unbounded
    pub dedup_capacity: Option<usize>,

    /// Page size used by `get_latest_messages` (default: 50)
    pub default_page_size: usize,
}

impl StoreConfig {
    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_seconds)
    }

    pub fn summary_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.summary_sweep_interval_seconds)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::path::PathBuf::from("msgvault.db"),
            summary_ttl_seconds: 10 * 60,
            summary_sweep_interval_seconds: 15 * 60,
            dedup_capacity: None,
            default_page_size: MAX_MESSAGE_CACHE_SIZE,
        }
    }
}
