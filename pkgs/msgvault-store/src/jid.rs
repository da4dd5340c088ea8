//! Chat and sender addresses

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `user@server` address identifying a chat or a participant.
///
/// The `user` portion doubles as the chat key used by the summary cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Parse a `user@server` string
    pub fn parse(raw: &str) -> Result<Self> {
        let (user, server) = raw
            .split_once('@')
            .ok_or_else(|| StoreError::InvalidJid(raw.to_string()))?;

        if user.is_empty() || server.is_empty() || server.contains('@') {
            return Err(StoreError::InvalidJid(raw.to_string()));
        }

        Ok(Self::new(user, server))
    }

    /// Key under which the chat's summary is cached
    pub fn chat_key(&self) -> &str {
        &self.user
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl FromStr for Jid {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
