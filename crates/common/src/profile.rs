//! # Private profiles
//!
//! Profile fields an account only shows to its trusted circle, encrypted under
//! the account's `profile` session.
//!
//! Reads distinguish two outcomes that both mean "nothing to show":
//!
//! - **absent**: the account has no private profile (`Ok(None)`)
//! - **inaccessible**: a profile exists but this viewer cannot read it
//!   ([`ProfileError::Inaccessible`])
//!
//! [`PrivateProfiles::load_for_view`] folds everything into a [`ProfileView`] for
//! screens that must keep rendering; edit affordances are disabled only when
//! loading failed for a reason other than absence.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::{
    BackendError, ContentService, GetEncryptedProfileRequest, PutEncryptedProfileRequest,
};
use crate::crypto::cipher;
use crate::item::ItemMetadata;
use crate::session::{SessionError, SessionManager};
use crate::types::{Did, ErrorCode, Scope};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields this client does not model, kept so they survive a rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decrypted profile with its server-attested metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub metadata: ItemMetadata,
    pub profile: PrivateProfile,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile inaccessible: {0}")]
    Inaccessible(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ProfileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProfileError::Inaccessible(_) => ErrorCode::DecryptionFailure,
            ProfileError::Backend(e) => e.code(),
            ProfileError::Session(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileView {
    Absent,
    Loaded(ProfileRecord),
    Unavailable(ErrorCode),
}

impl ProfileView {
    pub fn can_edit(&self) -> bool {
        !matches!(self, ProfileView::Unavailable(_))
    }

    pub fn profile(&self) -> Option<&PrivateProfile> {
        match self {
            ProfileView::Loaded(record) => Some(&record.profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrivateProfiles {
    sessions: SessionManager,
    content: Arc<dyn ContentService>,
}

impl PrivateProfiles {
    pub fn new(sessions: SessionManager, content: Arc<dyn ContentService>) -> Self {
        Self { sessions, content }
    }

    pub async fn get_profile(&self, did: &Did) -> Result<Option<ProfileRecord>, ProfileError> {
        let response = match self
            .content
            .get_encrypted_profile(GetEncryptedProfileRequest { did: did.clone() })
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry = response.session_key.ok_or_else(|| {
            ProfileError::Inaccessible(format!("profile of {} is not shared with viewer", did))
        })?;
        let private = match self.sessions.key_store().get_private_key().await {
            Ok(private) => private,
            Err(e) if e.is_not_found() => {
                return Err(ProfileError::Inaccessible(
                    "viewer has no private key".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let dek = cipher::decrypt_dek(&entry.encrypted_dek, &private.secret_key)
            .map_err(|e| ProfileError::Inaccessible(e.to_string()))?;
        let profile: PrivateProfile = cipher::decrypt_content(&response.profile.cipher_text, &dek)
            .map_err(|e| ProfileError::Inaccessible(e.to_string()))?;

        Ok(Some(ProfileRecord {
            metadata: response.profile.metadata,
            profile,
        }))
    }

    /// Encrypt and store the caller's private profile
    pub async fn put_profile(&self, profile: &PrivateProfile) -> Result<(), ProfileError> {
        let session = self.sessions.get_or_create_session(Scope::Profile).await?;
        let cipher_text = cipher::encrypt_content(profile, &session.dek).map_err(SessionError::from)?;
        self.content
            .put_encrypted_profile(PutEncryptedProfileRequest {
                session_id: session.session_id,
                cipher_text,
                metadata: ItemMetadata::new(self.sessions.did().clone(), Utc::now()),
            })
            .await?;
        tracing::debug!(
            "stored private profile for {} under session {}",
            self.sessions.did(),
            session.session_id
        );
        Ok(())
    }

    pub async fn load_for_view(&self, did: &Did) -> ProfileView {
        match self.get_profile(did).await {
            Ok(Some(record)) => ProfileView::Loaded(record),
            Ok(None) => ProfileView::Absent,
            Err(e) => {
                tracing::warn!("private profile of {} unavailable: {}", did, e);
                ProfileView::Unavailable(e.code())
            }
        }
    }
}
