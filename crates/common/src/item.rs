//! # Items
//!
//! An [`EncryptedItem`] is a post or profile body sealed under a session DEK,
//! stored next to plaintext metadata the server attests to (author, timestamps,
//! language tags, reply links). Only the body is encrypted.
//!
//! When an item is decrypted the two halves are merged into a [`DecryptedItem`].
//! Metadata is authoritative: on a field collision the metadata value wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto::WrappedDek;
use crate::types::{Did, ItemId, KeyPairId, SessionId};

/// Links a reply to its thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: ItemId,
    pub parent: ItemId,
}

/// Plaintext, server-attested fields kept outside the cipher text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub author: Did,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
}

impl ItemMetadata {
    pub fn new(author: Did, created_at: DateTime<Utc>) -> Self {
        Self {
            author,
            created_at,
            langs: Vec::new(),
            reply: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedItem {
    pub id: ItemId,
    pub session_id: SessionId,
    pub cipher_text: Vec<u8>,
    pub metadata: ItemMetadata,
}

/// One recipient's wrapped copy of a session DEK, as submitted on session creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMember {
    pub recipient: Did,
    pub encrypted_dek: WrappedDek,
    pub key_pair_id: KeyPairId,
}

/// The viewer's own wrapped DEK for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyEntry {
    pub session_id: SessionId,
    pub encrypted_dek: WrappedDek,
    pub key_pair_id: KeyPairId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedItem {
    pub id: ItemId,
    pub session_id: SessionId,
    pub metadata: ItemMetadata,
    /// Decrypted body overlaid with the serialized metadata
    pub record: Map<String, Value>,
}

impl DecryptedItem {
    /// Merge a decrypted body with the item's metadata
    ///
    /// A body that is not a JSON object is kept under a `"body"` key so it
    /// still merges without clobbering metadata.
    pub fn merge(item: &EncryptedItem, body: Value) -> Result<Self, serde_json::Error> {
        let mut record = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other);
                map
            }
        };

        if let Value::Object(metadata) = serde_json::to_value(&item.metadata)? {
            for (key, value) in metadata {
                record.insert(key, value);
            }
        }
        // metadata left out when empty stays absent; the body cannot supply it
        if item.metadata.langs.is_empty() {
            record.remove("langs");
        }
        if item.metadata.reply.is_none() {
            record.remove("reply");
        }

        Ok(Self {
            id: item.id.clone(),
            session_id: item.session_id,
            metadata: item.metadata.clone(),
            record,
        })
    }
}
