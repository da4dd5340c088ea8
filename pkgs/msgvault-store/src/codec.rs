//! Encode/decode contracts for the `msg_info` and `raw` columns.
//!
//! Metadata is stored schema-tagged: a four byte tag naming the record type,
//! one version byte, then the payload. Bodies are stored as plain bincode.
//! Each registered tag carries its own payload decoder, and only registered
//! tags can be read or written, so the set of accepted layouts is fixed when
//! the store is built.

use crate::error::{Result, StoreError};
use crate::message::{MessageBody, MessageInfo};
use std::collections::HashMap;

/// Tag for [`MessageInfo`] records
pub const MESSAGE_INFO_TAG: [u8; 4] = *b"MINF";
pub const MESSAGE_INFO_VERSION: u8 = 1;

const HEADER_LEN: usize = 5;

/// Decodes the payload following a schema header
pub type InfoDecoder = fn(&[u8]) -> Result<MessageInfo>;

#[derive(Clone, Copy)]
struct Schema {
    /// Highest supported version
    version: u8,
    decode: InfoDecoder,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct MessageCodec {
    schemas: HashMap<[u8; 4], Schema>,
}

/// Payload decoder for [`MESSAGE_INFO_TAG`]
pub fn decode_bincode_info(payload: &[u8]) -> Result<MessageInfo> {
    bincode::deserialize(payload).map_err(|e| StoreError::Decode(e.to_string()))
}

impl MessageCodec {
    /// Codec with no registered schemas
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Codec with the message metadata schema registered
    pub fn new() -> Self {
        let mut codec = Self::empty();
        codec.register(MESSAGE_INFO_TAG, MESSAGE_INFO_VERSION, decode_bincode_info);
        codec
    }

    /// Accept `tag` up to `version`, decoding its payload with `decode`.
    /// Registering a tag again replaces it.
    pub fn register(&mut self, tag: [u8; 4], version: u8, decode: InfoDecoder) {
        self.schemas.insert(tag, Schema { version, decode });
    }

    pub fn is_registered(&self, tag: &[u8; 4]) -> bool {
        self.schemas.contains_key(tag)
    }

    /// Encode under [`MESSAGE_INFO_TAG`] at its registered version
    pub fn encode_info(&self, info: &MessageInfo) -> Result<Vec<u8>> {
        let schema = self
            .schemas
            .get(&MESSAGE_INFO_TAG)
            .ok_or(StoreError::UnknownSchema(MESSAGE_INFO_TAG))?;

        let payload = bincode::serialize(info)?;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&MESSAGE_INFO_TAG);
        buf.push(schema.version);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    pub fn decode_info(&self, data: &[u8]) -> Result<MessageInfo> {
        if data.len() < HEADER_LEN {
            return Err(StoreError::Decode(format!(
                "metadata too short: {} bytes",
                data.len()
            )));
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[..4]);
        let version = data[4];

        let schema = self
            .schemas
            .get(&tag)
            .ok_or(StoreError::UnknownSchema(tag))?;
        if version == 0 || version > schema.version {
            return Err(StoreError::UnsupportedVersion(version));
        }

        (schema.decode)(&data[HEADER_LEN..])
    }

    pub fn encode_body(&self, body: &MessageBody) -> Result<Vec<u8>> {
        Ok(bincode::serialize(body)?)
    }

    pub fn decode_body(&self, data: &[u8]) -> Result<MessageBody> {
        bincode::deserialize(data).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}
