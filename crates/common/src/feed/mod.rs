//! Paginated feed sources
//!
//! A [`FeedSource`] is anything that can peek at its newest item and serve
//! cursor-paginated pages. The private source ([`PrivateFeedSource`]) decrypts
//! what the viewer can read; public sources are injected by the embedding
//! application. [`FeedMerger`] composes one of each behind a single
//! [`CompositeCursor`], and [`BestEffort`] bounds a slow or failing source with a
//! deadline and an empty fallback.

mod best_effort;
mod cursor;
mod merger;
mod private;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use best_effort::BestEffort;
pub use cursor::{CompositeCursor, SubCursor, CURSOR_SEPARATOR, EXHAUSTED_CURSOR};
pub use merger::FeedMerger;
pub use private::PrivateFeedSource;

use crate::backend::BackendError;
use crate::item::DecryptedItem;
use crate::types::{Did, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub author: Did,
    pub created_at: DateTime<Utc>,
    pub record: Map<String, Value>,
    pub visibility: Visibility,
}

impl From<DecryptedItem> for FeedItem {
    fn from(item: DecryptedItem) -> Self {
        Self {
            id: item.id,
            author: item.metadata.author,
            created_at: item.metadata.created_at,
            record: item.record,
            visibility: Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    pub cursor: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    /// `None` once the source has nothing further
    pub cursor: Option<String>,
    pub items: Vec<FeedItem>,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("feed source timed out after {0:?}")]
    Timeout(Duration),
    #[error("feed source error: {0}")]
    Source(#[from] anyhow::Error),
}

impl FeedError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FeedError::Backend(e) => e.code(),
            FeedError::InvalidCursor(_) => ErrorCode::InvalidRequest,
            FeedError::Timeout(_) | FeedError::Source(_) => ErrorCode::Transport,
        }
    }
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// The newest item, if any
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError>;

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError>;
}

#[async_trait]
impl<S: FeedSource + ?Sized> FeedSource for Arc<S> {
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError> {
        (**self).peek_latest().await
    }

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError> {
        (**self).fetch(params).await
    }
}
