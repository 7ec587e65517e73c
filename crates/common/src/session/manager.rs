use std::sync::Arc;

use crate::backend::{
    BackendError, CreateSessionRequest, GetSessionRequest, RewrapSessionEntriesRequest,
    SessionService, TrustedRecipientResolver,
};
use crate::crypto::cipher::{self, CipherError};
use crate::crypto::Dek;
use crate::item::{SessionKeyEntry, SessionMember};
use crate::keystore::{KeyPair, KeyStore};
use crate::types::{Did, ErrorCode, Scope, SessionId};

use super::trusted::TrustedCircleCache;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("created session {0} has no entry for its owner")]
    MissingOwnerEntry(SessionId),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Backend(e) => e.code(),
            SessionError::Cipher(e) => e.code(),
            SessionError::MissingOwnerEntry(_) => ErrorCode::InvalidRequest,
        }
    }
}

/// An open session: the id to write under and its DEK
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub dek: Dek,
}

/// Obtains or lazily creates sessions for one account
///
/// Sessions are immutable. When the trusted circle changes, the next session
/// created for a scope picks up the new members; existing content stays bound
/// to the session it was written under.
///
/// Creation is not single-flight: two concurrent callers that both miss on
/// `get_session` for the same scope will both create a session, and the later
/// one becomes current.
#[derive(Debug, Clone)]
pub struct SessionManager {
    did: Did,
    key_store: KeyStore,
    sessions: Arc<dyn SessionService>,
    resolver: Arc<dyn TrustedRecipientResolver>,
    trusted_cache: Arc<dyn TrustedCircleCache>,
}

impl SessionManager {
    pub fn new(
        did: Did,
        key_store: KeyStore,
        sessions: Arc<dyn SessionService>,
        resolver: Arc<dyn TrustedRecipientResolver>,
        trusted_cache: Arc<dyn TrustedCircleCache>,
    ) -> Self {
        Self {
            did,
            key_store,
            sessions,
            resolver,
            trusted_cache,
        }
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    pub async fn get_or_create_session(&self, scope: Scope) -> Result<SessionHandle, SessionError> {
        match self.sessions.get_session(GetSessionRequest { scope }).await {
            Ok(entry) => {
                let key_pair = self.key_store.get_or_create_key_pair(&self.did).await?;
                if key_pair.key_pair_id != entry.key_pair_id {
                    tracing::warn!(
                        "{} session {} was wrapped for keypair {}, current is {}",
                        scope,
                        entry.session_id,
                        entry.key_pair_id,
                        key_pair.key_pair_id
                    );
                }
                let dek = cipher::decrypt_dek(&entry.encrypted_dek, &key_pair.secret_key)?;
                Ok(SessionHandle {
                    session_id: entry.session_id,
                    dek,
                })
            }
            Err(e) if e.is_not_found() => self.create_session(scope).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn create_session(&self, scope: Scope) -> Result<SessionHandle, SessionError> {
        let trusted = self.trusted_users().await?;
        let key_pair = self.key_store.get_or_create_key_pair(&self.did).await?;

        let mut recipients: Vec<Did> = Vec::with_capacity(trusted.len());
        for did in trusted {
            if did != self.did && !recipients.contains(&did) {
                recipients.push(did);
            }
        }
        let published = self.key_store.get_public_keys_batch(&recipients).await?;
        if published.len() < recipients.len() {
            tracing::warn!(
                "{} of {} trusted recipients of {} have no published key and are left out",
                recipients.len() - published.len(),
                recipients.len(),
                self.did
            );
        }

        let dek = cipher::generate_dek();
        let mut members = Vec::with_capacity(published.len() + 1);
        let own_entry = cipher::encrypt_dek(&dek, &key_pair.public_key)?;
        members.push(SessionMember {
            recipient: self.did.clone(),
            encrypted_dek: own_entry,
            key_pair_id: key_pair.key_pair_id,
        });
        for key in published {
            if key.did == self.did || members.iter().any(|m| m.recipient == key.did) {
                continue;
            }
            members.push(SessionMember {
                encrypted_dek: cipher::encrypt_dek(&dek, &key.public_key)?,
                recipient: key.did,
                key_pair_id: key.key_pair_id,
            });
        }

        let member_count = members.len();
        let response = self
            .sessions
            .create_session(CreateSessionRequest { scope, members })
            .await?;
        tracing::info!(
            "created {} session {} for {} with {} members",
            scope,
            response.session_id,
            self.did,
            member_count
        );

        // hand back the DEK as recovered from our own entry
        let dek = cipher::decrypt_dek(&own_entry, &key_pair.secret_key)?;
        Ok(SessionHandle {
            session_id: response.session_id,
            dek,
        })
    }

    /// The caller's trusted circle, read through the cache
    pub async fn trusted_users(&self) -> Result<Vec<Did>, BackendError> {
        if let Some(trusted) = self.trusted_cache.get(&self.did) {
            tracing::debug!("trusted circle cache hit for {}", self.did);
            return Ok(trusted);
        }
        let trusted = self.resolver.trusted_users(&self.did).await?;
        self.trusted_cache.set(&self.did, trusted.clone());
        Ok(trusted)
    }

    /// Drop the cached trusted circle so the next session creation re-resolves it
    pub fn invalidate_trusted_circle(&self) {
        self.trusted_cache.invalidate(&self.did);
    }

    /// Replace the caller's keypair and re-wrap every session entry addressed to it
    ///
    /// Entries that cannot be unwrapped with the current key are skipped; they were
    /// already unreadable. If the caller has no keypair yet one is simply created.
    pub async fn rotate_key_pair(&self) -> Result<KeyPair, SessionError> {
        let current = match self.key_store.get_private_key().await {
            Ok(private) => private,
            Err(e) if e.is_not_found() => {
                return Ok(self.key_store.get_or_create_key_pair(&self.did).await?)
            }
            Err(e) => return Err(e.into()),
        };

        let entries = self.sessions.list_session_entries().await?;
        let mut deks = Vec::with_capacity(entries.len());
        for entry in entries {
            match cipher::decrypt_dek(&entry.encrypted_dek, &current.secret_key) {
                Ok(dek) => deks.push((entry.session_id, dek)),
                Err(e) => tracing::warn!(
                    "skipping session {} during rotation for {}: {}",
                    entry.session_id,
                    self.did,
                    e
                ),
            }
        }

        let (public_key, secret_key) = cipher::generate_key_pair();
        let key_pair_id = self.key_store.publish(public_key, secret_key.clone()).await?;

        let mut rewrapped = Vec::with_capacity(deks.len());
        for (session_id, dek) in deks {
            rewrapped.push(SessionKeyEntry {
                session_id,
                encrypted_dek: cipher::encrypt_dek(&dek, &public_key)?,
                key_pair_id,
            });
        }
        let rewrapped_count = rewrapped.len();
        self.sessions
            .rewrap_session_entries(RewrapSessionEntriesRequest { entries: rewrapped })
            .await?;
        tracing::info!(
            "rotated keypair for {} to {}, re-wrapped {} session entries",
            self.did,
            key_pair_id,
            rewrapped_count
        );

        Ok(KeyPair {
            public_key,
            secret_key,
            key_pair_id,
        })
    }
}
