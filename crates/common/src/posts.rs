use std::sync::Arc;

use serde_json::{Map, Value};

use crate::backend::{ContentService, CreateEncryptedItemsRequest, NewEncryptedItem};
use crate::crypto::cipher;
use crate::item::ItemMetadata;
use crate::session::{SessionError, SessionManager};
use crate::types::{ItemId, Scope};

/// A post body to be written privately, with its plaintext metadata
#[derive(Debug, Clone)]
pub struct NewPost {
    pub body: Map<String, Value>,
    pub metadata: ItemMetadata,
}

/// Writes private posts under the author's post session
#[derive(Debug, Clone)]
pub struct PrivatePosts {
    sessions: SessionManager,
    content: Arc<dyn ContentService>,
}

impl PrivatePosts {
    pub fn new(sessions: SessionManager, content: Arc<dyn ContentService>) -> Self {
        Self { sessions, content }
    }

    /// Encrypt and store posts, returning their ids in input order
    pub async fn create_posts(&self, posts: Vec<NewPost>) -> Result<Vec<ItemId>, SessionError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.sessions.get_or_create_session(Scope::Post).await?;
        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            items.push(NewEncryptedItem {
                cipher_text: cipher::encrypt_content(&post.body, &session.dek)?,
                metadata: post.metadata,
            });
        }

        let response = self
            .content
            .create_encrypted_items(CreateEncryptedItemsRequest {
                session_id: session.session_id,
                items,
            })
            .await?;
        tracing::debug!(
            "stored {} private posts under session {}",
            response.ids.len(),
            session.session_id
        );
        Ok(response.ids)
    }
}
