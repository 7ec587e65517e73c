//! Request and response shapes, one pair per backend endpoint

use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, SecretKey};
use crate::item::{EncryptedItem, ItemMetadata, SessionKeyEntry, SessionMember};
use crate::types::{Did, ItemId, KeyPairId, Scope, SessionId};

/// Largest id list the key service accepts in one `get_public_keys` call
pub const MAX_PUBLIC_KEYS_PER_REQUEST: usize = 25;

// key service

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKeyRequest {
    pub did: Did,
}

/// A public key as published by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedKey {
    pub did: Did,
    pub public_key: PublicKey,
    pub key_pair_id: KeyPairId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKeysRequest {
    pub dids: Vec<Did>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKeysResponse {
    /// Accounts without a published key are omitted
    pub keys: Vec<PublishedKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateKey {
    pub secret_key: SecretKey,
    pub key_pair_id: KeyPairId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateKeyPairRequest {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateKeyPairResponse {
    pub key_pair_id: KeyPairId,
}

// session service

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSessionRequest {
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub scope: Scope,
    pub members: Vec<SessionMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrapSessionEntriesRequest {
    pub entries: Vec<SessionKeyEntry>,
}

// content service

/// Whose items a content fetch covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    Everyone,
    Author(Did),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEncryptedItemsRequest {
    pub cursor: Option<String>,
    pub audience: Audience,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEncryptedItemsResponse {
    pub cursor: Option<String>,
    pub items: Vec<EncryptedItem>,
    /// The viewer's own entries for sessions referenced by `items`
    pub session_keys: Vec<SessionKeyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEncryptedItem {
    pub cipher_text: Vec<u8>,
    pub metadata: ItemMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEncryptedItemsRequest {
    pub session_id: SessionId,
    pub items: Vec<NewEncryptedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEncryptedItemsResponse {
    pub ids: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEncryptedProfileRequest {
    pub did: Did,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEncryptedProfileResponse {
    pub profile: EncryptedItem,
    /// Absent when the profile's session was not shared with the viewer
    pub session_key: Option<SessionKeyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEncryptedProfileRequest {
    pub session_id: SessionId,
    pub cipher_text: Vec<u8>,
    pub metadata: ItemMetadata,
}
