//! # Key store
//!
//! Owns the lifecycle of an account's keypair as seen from the client:
//! fetching published public keys, fetching the caller's private key, and
//! generating one lazily the first time it is needed.
//!
//! Lazy creation is not guarded against concurrent callers; two racing
//! `get_or_create_key_pair` calls may both publish, and the last write wins.

use std::sync::Arc;

use crate::backend::{
    BackendError, GetPublicKeyRequest, GetPublicKeysRequest, KeyService, PrivateKey,
    PublishedKey, RotateKeyPairRequest, MAX_PUBLIC_KEYS_PER_REQUEST,
};
use crate::crypto::cipher;
use crate::crypto::{PublicKey, SecretKey};
use crate::types::{Did, KeyPairId};

/// A full keypair, only ever materialized for the caller's own account
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
    pub key_pair_id: KeyPairId,
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    keys: Arc<dyn KeyService>,
    batch_size: usize,
}

impl KeyStore {
    /// `batch_size` is clamped to what a single key request may carry
    pub fn new(keys: Arc<dyn KeyService>, batch_size: usize) -> Self {
        Self {
            keys,
            batch_size: batch_size.clamp(1, MAX_PUBLIC_KEYS_PER_REQUEST),
        }
    }

    pub async fn get_public_key(&self, did: &Did) -> Result<PublishedKey, BackendError> {
        self.keys
            .get_public_key(GetPublicKeyRequest { did: did.clone() })
            .await
    }

    /// The caller's own private key; `NotFound` if none was generated yet
    pub async fn get_private_key(&self) -> Result<PrivateKey, BackendError> {
        self.keys.get_private_key().await
    }

    /// Fetch the caller's keypair, generating and publishing one if absent
    pub async fn get_or_create_key_pair(&self, did: &Did) -> Result<KeyPair, BackendError> {
        match self.get_public_key(did).await {
            Ok(published) => {
                let private = self.get_private_key().await?;
                if private.key_pair_id != published.key_pair_id {
                    tracing::warn!(
                        "published key {} for {} differs from private key {}",
                        published.key_pair_id,
                        did,
                        private.key_pair_id
                    );
                }
                Ok(KeyPair {
                    public_key: private.secret_key.public(),
                    secret_key: private.secret_key,
                    key_pair_id: private.key_pair_id,
                })
            }
            Err(e) if e.is_not_found() => {
                let (public_key, secret_key) = cipher::generate_key_pair();
                let key_pair_id = self.publish(public_key, secret_key.clone()).await?;
                tracing::info!("generated keypair {} for {}", key_pair_id, did);
                Ok(KeyPair {
                    public_key,
                    secret_key,
                    key_pair_id,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch published keys for many accounts
    ///
    /// Requests go out in chunks of `batch_size`, one after another, so no single
    /// request exceeds what the key service accepts. Accounts without a key are
    /// left out of the result.
    pub async fn get_public_keys_batch(
        &self,
        dids: &[Did],
    ) -> Result<Vec<PublishedKey>, BackendError> {
        let mut keys = Vec::with_capacity(dids.len());
        for chunk in dids.chunks(self.batch_size) {
            let response = self
                .keys
                .get_public_keys(GetPublicKeysRequest {
                    dids: chunk.to_vec(),
                })
                .await?;
            keys.extend(response.keys);
        }
        Ok(keys)
    }

    /// Replace the caller's keypair with the given one
    ///
    /// Callers outside the crate rotate through the session manager, which also
    /// re-wraps existing session entries.
    pub(crate) async fn publish(
        &self,
        public_key: PublicKey,
        secret_key: SecretKey,
    ) -> Result<KeyPairId, BackendError> {
        let response = self
            .keys
            .rotate_key_pair(RotateKeyPairRequest {
                public_key,
                secret_key,
            })
            .await?;
        Ok(response.key_pair_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn key_store(backend: &MemoryBackend, did: &str, batch_size: usize) -> KeyStore {
        KeyStore::new(Arc::new(backend.client(did)), batch_size)
    }

    #[tokio::test]
    async fn test_missing_keys_are_not_found() {
        let backend = MemoryBackend::new();
        let store = key_store(&backend, "did:example:alice", 25);

        let err = store
            .get_public_key(&Did::from("did:example:alice"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_private_key().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let backend = MemoryBackend::new();
        let alice = Did::from("did:example:alice");
        let store = key_store(&backend, alice.as_str(), 25);

        let created = store.get_or_create_key_pair(&alice).await.unwrap();
        let fetched = store.get_or_create_key_pair(&alice).await.unwrap();
        assert_eq!(created.key_pair_id, fetched.key_pair_id);
        assert_eq!(created.public_key, fetched.public_key);
        assert_eq!(backend.calls("rotate_key_pair"), 1);

        let published = store.get_public_key(&alice).await.unwrap();
        assert_eq!(published.public_key, created.public_key);
    }

    #[tokio::test]
    async fn test_batch_fetch_is_chunked() {
        let backend = MemoryBackend::new();
        let mut dids = Vec::new();
        for i in 0..60 {
            let did = Did::new(format!("did:example:user{}", i));
            key_store(&backend, did.as_str(), 25)
                .get_or_create_key_pair(&did)
                .await
                .unwrap();
            dids.push(did);
        }
        dids.push(Did::from("did:example:nobody"));

        let store = key_store(&backend, "did:example:reader", 25);
        let keys = store.get_public_keys_batch(&dids).await.unwrap();

        assert_eq!(keys.len(), 60);
        // 61 ids -> 25 + 25 + 11
        assert_eq!(backend.calls("get_public_keys"), 3);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_clamped_to_request_limit() {
        let backend = MemoryBackend::new();
        let mut dids = Vec::new();
        for i in 0..30 {
            let did = Did::new(format!("did:example:user{}", i));
            key_store(&backend, did.as_str(), 25)
                .get_or_create_key_pair(&did)
                .await
                .unwrap();
            dids.push(did);
        }

        let store = key_store(&backend, "did:example:reader", 30);
        let keys = store.get_public_keys_batch(&dids).await.unwrap();

        assert_eq!(keys.len(), 30);
        assert_eq!(backend.calls("get_public_keys"), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_requests() {
        let backend = MemoryBackend::new();
        let store = key_store(&backend, "did:example:reader", 25);
        assert!(store.get_public_keys_batch(&[]).await.unwrap().is_empty());
        assert_eq!(backend.calls("get_public_keys"), 0);
    }
}
