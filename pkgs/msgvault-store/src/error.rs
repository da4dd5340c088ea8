//! Error types for message storage operations

use thiserror::Error;

/// Errors that can occur while persisting or decoding messages
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Unknown metadata schema tag: {0:?}")]
    UnknownSchema([u8; 4]),
    #[error("Unsupported metadata schema version: {0}")]
    UnsupportedVersion(u8),
    #[error("Invalid JID: {0}")]
    InvalidJid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
