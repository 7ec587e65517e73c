use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::error::BackendError;
use super::messages::*;
use super::{ContentService, KeyService, SessionService, TrustedRecipientResolver};
use crate::agent::Services;
use crate::crypto::{PublicKey, SecretKey};
use crate::item::{EncryptedItem, SessionKeyEntry, SessionMember};
use crate::session::TrustedCircleCache;
use crate::types::{Did, KeyPairId, Scope, SessionId};

/// In-process backend holding keys, sessions, items and profiles in HashMaps
///
/// The backend is shared state; [`MemoryBackend::client`] hands out a view
/// authenticated as one account, which is what the pipeline talks to.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<MemoryBackendInner>>,
}

#[derive(Debug, Default)]
struct MemoryBackendInner {
    keys: HashMap<Did, StoredKeyPair>,
    sessions: HashMap<SessionId, StoredSession>,
    /// Latest session per (owner, scope)
    current_sessions: HashMap<(Did, Scope), SessionId>,
    /// Insertion order; pages are served newest first
    items: Vec<EncryptedItem>,
    profiles: HashMap<Did, EncryptedItem>,
    trusted: HashMap<Did, Vec<Did>>,
    calls: HashMap<&'static str, usize>,
    /// One-shot failures queued by [`MemoryBackend::fail_next`]
    failures: HashMap<String, BackendError>,
    next_item: u64,
}

#[derive(Debug, Clone)]
struct StoredKeyPair {
    public_key: PublicKey,
    secret_key: SecretKey,
    key_pair_id: KeyPairId,
}

#[derive(Debug, Clone)]
struct StoredSession {
    owner: Did,
    members: Vec<SessionMember>,
}

impl StoredSession {
    fn entry_for(&self, session_id: SessionId, did: &Did) -> Option<SessionKeyEntry> {
        self.members
            .iter()
            .find(|m| &m.recipient == did)
            .map(|m| SessionKeyEntry {
                session_id,
                encrypted_dek: m.encrypted_dek,
                key_pair_id: m.key_pair_id,
            })
    }
}

impl MemoryBackendInner {
    /// Count a call, then fail it if a failure is queued for the endpoint
    fn record(&mut self, endpoint: &'static str) -> Result<(), BackendError> {
        *self.calls.entry(endpoint).or_default() += 1;
        match self.failures.remove(endpoint) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn owned_session(&self, session_id: SessionId, owner: &Did) -> Result<(), BackendError> {
        match self.sessions.get(&session_id) {
            Some(session) if &session.owner == owner => Ok(()),
            Some(_) => Err(BackendError::InvalidRequest(format!(
                "session {} is not owned by {}",
                session_id, owner
            ))),
            None => Err(BackendError::NotFound(format!("session {}", session_id))),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client authenticated as `did`
    pub fn client(&self, did: impl Into<Did>) -> MemoryClient {
        MemoryClient {
            did: did.into(),
            backend: self.clone(),
        }
    }

    /// Replace `did`'s trusted circle and retire its current sessions, so the
    /// next write for each scope creates a session for the new circle
    pub fn set_trusted_users(&self, did: &Did, trusted: Vec<Did>) {
        let mut inner = self.inner.write();
        inner.trusted.insert(did.clone(), trusted);
        inner.current_sessions.retain(|(owner, _), _| owner != did);
    }

    /// Make the next call to `endpoint` (named after its trait method) fail
    /// with `error`; later calls succeed again
    pub fn fail_next(&self, endpoint: &str, error: BackendError) {
        self.inner.write().failures.insert(endpoint.to_string(), error);
    }

    /// How many times an endpoint (named after its trait method) was called
    pub fn calls(&self, endpoint: &str) -> usize {
        self.inner.read().calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn session_members(&self, session_id: SessionId) -> Option<Vec<SessionMember>> {
        self.inner
            .read()
            .sessions
            .get(&session_id)
            .map(|s| s.members.clone())
    }

    /// Flip a byte of a stored item's cipher text; returns false if no such item
    pub fn corrupt_item(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.items.iter_mut().find(|item| item.id == id) {
            Some(item) => flip_last_byte(&mut item.cipher_text),
            None => false,
        }
    }

    /// Flip a byte of a stored profile's cipher text; returns false if no such profile
    pub fn corrupt_profile(&self, did: &Did) -> bool {
        let mut inner = self.inner.write();
        match inner.profiles.get_mut(did) {
            Some(profile) => flip_last_byte(&mut profile.cipher_text),
            None => false,
        }
    }
}

fn flip_last_byte(bytes: &mut [u8]) -> bool {
    match bytes.last_mut() {
        Some(byte) => {
            *byte ^= 0xFF;
            true
        }
        None => false,
    }
}

#[async_trait]
impl TrustedRecipientResolver for MemoryBackend {
    async fn trusted_users(&self, did: &Did) -> Result<Vec<Did>, BackendError> {
        let mut inner = self.inner.write();
        inner.record("trusted_users")?;
        Ok(inner.trusted.get(did).cloned().unwrap_or_default())
    }
}

/// View of a [`MemoryBackend`] authenticated as one account
#[derive(Debug, Clone)]
pub struct MemoryClient {
    did: Did,
    backend: MemoryBackend,
}

impl MemoryClient {
    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// Every service as this account, sharing `trusted_cache`
    pub fn services(&self, trusted_cache: Arc<dyn TrustedCircleCache>) -> Services {
        let client = Arc::new(self.clone());
        Services {
            keys: client.clone(),
            sessions: client.clone(),
            content: client,
            resolver: Arc::new(self.backend.clone()),
            trusted_cache,
        }
    }
}

#[async_trait]
impl KeyService for MemoryClient {
    async fn get_public_key(
        &self,
        request: GetPublicKeyRequest,
    ) -> Result<PublishedKey, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("get_public_key")?;
        inner
            .keys
            .get(&request.did)
            .map(|k| PublishedKey {
                did: request.did.clone(),
                public_key: k.public_key,
                key_pair_id: k.key_pair_id,
            })
            .ok_or_else(|| BackendError::NotFound(format!("public key for {}", request.did)))
    }

    async fn get_public_keys(
        &self,
        request: GetPublicKeysRequest,
    ) -> Result<GetPublicKeysResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("get_public_keys")?;
        if request.dids.len() > MAX_PUBLIC_KEYS_PER_REQUEST {
            return Err(BackendError::InvalidRequest(format!(
                "at most {} ids per request, got {}",
                MAX_PUBLIC_KEYS_PER_REQUEST,
                request.dids.len()
            )));
        }
        let keys = request
            .dids
            .into_iter()
            .filter_map(|did| {
                inner.keys.get(&did).map(|k| PublishedKey {
                    public_key: k.public_key,
                    key_pair_id: k.key_pair_id,
                    did,
                })
            })
            .collect();
        Ok(GetPublicKeysResponse { keys })
    }

    async fn get_private_key(&self) -> Result<PrivateKey, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("get_private_key")?;
        inner
            .keys
            .get(&self.did)
            .map(|k| PrivateKey {
                secret_key: k.secret_key.clone(),
                key_pair_id: k.key_pair_id,
            })
            .ok_or_else(|| BackendError::NotFound(format!("private key for {}", self.did)))
    }

    async fn rotate_key_pair(
        &self,
        request: RotateKeyPairRequest,
    ) -> Result<RotateKeyPairResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("rotate_key_pair")?;
        if request.secret_key.public() != request.public_key {
            return Err(BackendError::InvalidRequest(
                "public key does not match private key".to_string(),
            ));
        }
        let key_pair_id = Uuid::new_v4();
        inner.keys.insert(
            self.did.clone(),
            StoredKeyPair {
                public_key: request.public_key,
                secret_key: request.secret_key,
                key_pair_id,
            },
        );
        Ok(RotateKeyPairResponse { key_pair_id })
    }
}

#[async_trait]
impl SessionService for MemoryClient {
    async fn get_session(
        &self,
        request: GetSessionRequest,
    ) -> Result<SessionKeyEntry, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("get_session")?;
        let not_found =
            || BackendError::NotFound(format!("{} session for {}", request.scope, self.did));
        let session_id = *inner
            .current_sessions
            .get(&(self.did.clone(), request.scope))
            .ok_or_else(not_found)?;
        inner
            .sessions
            .get(&session_id)
            .and_then(|s| s.entry_for(session_id, &self.did))
            .ok_or_else(not_found)
    }

    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("create_session")?;

        let mut seen = HashSet::new();
        for member in &request.members {
            if !seen.insert(&member.recipient) {
                return Err(BackendError::InvalidRequest(format!(
                    "duplicate session member {}",
                    member.recipient
                )));
            }
        }
        if !seen.contains(&self.did) {
            return Err(BackendError::InvalidRequest(
                "session must include its owner".to_string(),
            ));
        }

        let session_id = Uuid::new_v4();
        inner.sessions.insert(
            session_id,
            StoredSession {
                owner: self.did.clone(),
                members: request.members,
            },
        );
        inner
            .current_sessions
            .insert((self.did.clone(), request.scope), session_id);
        Ok(CreateSessionResponse { session_id })
    }

    async fn list_session_entries(&self) -> Result<Vec<SessionKeyEntry>, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("list_session_entries")?;
        Ok(inner
            .sessions
            .iter()
            .filter_map(|(id, session)| session.entry_for(*id, &self.did))
            .collect())
    }

    async fn rewrap_session_entries(
        &self,
        request: RewrapSessionEntriesRequest,
    ) -> Result<(), BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("rewrap_session_entries")?;

        // all or nothing
        for entry in &request.entries {
            let is_member = inner
                .sessions
                .get(&entry.session_id)
                .map(|s| s.members.iter().any(|m| m.recipient == self.did))
                .unwrap_or(false);
            if !is_member {
                return Err(BackendError::InvalidRequest(format!(
                    "{} is not a member of session {}",
                    self.did, entry.session_id
                )));
            }
        }

        for entry in request.entries {
            if let Some(member) = inner
                .sessions
                .get_mut(&entry.session_id)
                .and_then(|s| s.members.iter_mut().find(|m| m.recipient == self.did))
            {
                member.encrypted_dek = entry.encrypted_dek;
                member.key_pair_id = entry.key_pair_id;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContentService for MemoryClient {
    async fn fetch_encrypted_items(
        &self,
        request: FetchEncryptedItemsRequest,
    ) -> Result<FetchEncryptedItemsResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("fetch_encrypted_items")?;

        let offset = match request.cursor.as_deref() {
            None => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| BackendError::InvalidRequest(format!("bad cursor {:?}", cursor)))?,
        };

        let matching: Vec<&EncryptedItem> = inner
            .items
            .iter()
            .rev()
            .filter(|item| match &request.audience {
                Audience::Everyone => true,
                Audience::Author(did) => &item.metadata.author == did,
            })
            .collect();

        let items: Vec<EncryptedItem> = matching
            .iter()
            .skip(offset)
            .take(request.limit)
            .map(|item| (*item).clone())
            .collect();
        let next = offset + items.len();
        let cursor = (next < matching.len()).then(|| next.to_string());

        let mut session_keys = Vec::new();
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.session_id) {
                continue;
            }
            if let Some(entry) = inner
                .sessions
                .get(&item.session_id)
                .and_then(|s| s.entry_for(item.session_id, &self.did))
            {
                session_keys.push(entry);
            }
        }

        Ok(FetchEncryptedItemsResponse {
            cursor,
            items,
            session_keys,
        })
    }

    async fn create_encrypted_items(
        &self,
        request: CreateEncryptedItemsRequest,
    ) -> Result<CreateEncryptedItemsResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("create_encrypted_items")?;
        inner.owned_session(request.session_id, &self.did)?;

        let mut ids = Vec::with_capacity(request.items.len());
        for new_item in request.items {
            inner.next_item += 1;
            let id = format!("{}/post/{}", self.did, inner.next_item);
            let mut metadata = new_item.metadata;
            // the server attests authorship
            metadata.author = self.did.clone();
            inner.items.push(EncryptedItem {
                id: id.clone(),
                session_id: request.session_id,
                cipher_text: new_item.cipher_text,
                metadata,
            });
            ids.push(id);
        }
        Ok(CreateEncryptedItemsResponse { ids })
    }

    async fn get_encrypted_profile(
        &self,
        request: GetEncryptedProfileRequest,
    ) -> Result<GetEncryptedProfileResponse, BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("get_encrypted_profile")?;
        let profile = inner
            .profiles
            .get(&request.did)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("profile for {}", request.did)))?;
        let session_key = inner
            .sessions
            .get(&profile.session_id)
            .and_then(|s| s.entry_for(profile.session_id, &self.did));
        Ok(GetEncryptedProfileResponse {
            profile,
            session_key,
        })
    }

    async fn put_encrypted_profile(
        &self,
        request: PutEncryptedProfileRequest,
    ) -> Result<(), BackendError> {
        let mut inner = self.backend.inner.write();
        inner.record("put_encrypted_profile")?;
        inner.owned_session(request.session_id, &self.did)?;

        let mut metadata = request.metadata;
        metadata.author = self.did.clone();
        let profile = EncryptedItem {
            id: format!("{}/profile/self", self.did),
            session_id: request.session_id,
            cipher_text: request.cipher_text,
            metadata,
        };
        inner.profiles.insert(self.did.clone(), profile);
        Ok(())
    }
}
