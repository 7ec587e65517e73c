//! Backend services consumed by the pipeline
//!
//! Each trait is the client side of one backend service, authenticated as a
//! single account ("the caller"). Implementations may talk to a remote server;
//! [`memory::MemoryBackend`] keeps everything in process.

mod error;
pub mod memory;
mod messages;

use async_trait::async_trait;

pub use error::BackendError;
pub use messages::*;

use crate::item::SessionKeyEntry;
use crate::types::Did;

#[async_trait]
pub trait KeyService: Send + Sync + std::fmt::Debug {
    /// Fetch an account's published key
    ///
    /// Fails with `NotFound` if the account never published one.
    async fn get_public_key(
        &self,
        request: GetPublicKeyRequest,
    ) -> Result<PublishedKey, BackendError>;

    /// Fetch published keys for at most [`MAX_PUBLIC_KEYS_PER_REQUEST`] accounts
    async fn get_public_keys(
        &self,
        request: GetPublicKeysRequest,
    ) -> Result<GetPublicKeysResponse, BackendError>;

    /// Fetch the caller's own private key
    async fn get_private_key(&self) -> Result<PrivateKey, BackendError>;

    /// Replace the caller's keypair, returning the id of the new one
    async fn rotate_key_pair(
        &self,
        request: RotateKeyPairRequest,
    ) -> Result<RotateKeyPairResponse, BackendError>;
}

#[async_trait]
pub trait SessionService: Send + Sync + std::fmt::Debug {
    /// The caller's current session for a scope, as the caller's own key entry
    async fn get_session(
        &self,
        request: GetSessionRequest,
    ) -> Result<SessionKeyEntry, BackendError>;

    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, BackendError>;

    /// Every session entry addressed to the caller, across all sessions
    async fn list_session_entries(&self) -> Result<Vec<SessionKeyEntry>, BackendError>;

    /// Replace the caller's own entries in the listed sessions
    async fn rewrap_session_entries(
        &self,
        request: RewrapSessionEntriesRequest,
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ContentService: Send + Sync + std::fmt::Debug {
    async fn fetch_encrypted_items(
        &self,
        request: FetchEncryptedItemsRequest,
    ) -> Result<FetchEncryptedItemsResponse, BackendError>;

    async fn create_encrypted_items(
        &self,
        request: CreateEncryptedItemsRequest,
    ) -> Result<CreateEncryptedItemsResponse, BackendError>;

    /// Fails with `NotFound` if the account has no private profile
    async fn get_encrypted_profile(
        &self,
        request: GetEncryptedProfileRequest,
    ) -> Result<GetEncryptedProfileResponse, BackendError>;

    async fn put_encrypted_profile(
        &self,
        request: PutEncryptedProfileRequest,
    ) -> Result<(), BackendError>;
}

/// Resolves the trusted circle an account shares private content with
#[async_trait]
pub trait TrustedRecipientResolver: Send + Sync + std::fmt::Debug {
    async fn trusted_users(&self, did: &Did) -> Result<Vec<Did>, BackendError>;
}
