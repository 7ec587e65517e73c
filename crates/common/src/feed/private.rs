use std::sync::Arc;

use async_trait::async_trait;

use super::{FeedError, FeedItem, FeedPage, FeedSource, FetchParams};
use crate::backend::{Audience, ContentService, FetchEncryptedItemsRequest};
use crate::decrypt::BatchDecryptor;
use crate::keystore::KeyStore;

/// Items scanned for a readable one when peeking
const PEEK_PAGE_SIZE: usize = 10;

/// Feed of the encrypted items a viewer can decrypt
///
/// Items the viewer has no session entry for, or that fail to decrypt, are
/// dropped from the page; the backend cursor passes through untouched, so a
/// page may hold fewer items than `limit` while more remain.
#[derive(Debug, Clone)]
pub struct PrivateFeedSource {
    content: Arc<dyn ContentService>,
    key_store: KeyStore,
    audience: Audience,
}

impl PrivateFeedSource {
    pub fn new(content: Arc<dyn ContentService>, key_store: KeyStore, audience: Audience) -> Self {
        Self {
            content,
            key_store,
            audience,
        }
    }

    /// The viewer's decryptor, or `None` if the viewer never generated a key
    async fn decryptor(&self) -> Result<Option<BatchDecryptor>, FeedError> {
        match self.key_store.get_private_key().await {
            Ok(private) => Ok(Some(BatchDecryptor::new(private.secret_key))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FeedSource for PrivateFeedSource {
    /// Newest readable item among the newest [`PEEK_PAGE_SIZE`] items
    ///
    /// Unreadable items at the head of the feed are skipped, but only within
    /// that first page.
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError> {
        let page = self
            .fetch(FetchParams {
                cursor: None,
                limit: PEEK_PAGE_SIZE,
            })
            .await?;
        Ok(page.items.into_iter().next())
    }

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError> {
        let response = self
            .content
            .fetch_encrypted_items(FetchEncryptedItemsRequest {
                cursor: params.cursor,
                audience: self.audience.clone(),
                limit: params.limit,
            })
            .await?;

        if response.items.is_empty() {
            return Ok(FeedPage {
                cursor: response.cursor,
                items: Vec::new(),
            });
        }

        let Some(decryptor) = self.decryptor().await? else {
            tracing::debug!(
                "viewer has no private key, skipping {} encrypted items",
                response.items.len()
            );
            return Ok(FeedPage {
                cursor: response.cursor,
                items: Vec::new(),
            });
        };

        let items = decryptor
            .decrypt_items(&response.items, &response.session_keys)
            .into_iter()
            .map(FeedItem::from)
            .collect();
        Ok(FeedPage {
            cursor: response.cursor,
            items,
        })
    }
}
