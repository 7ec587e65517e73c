use std::time::Duration;

use async_trait::async_trait;

use super::{FeedError, FeedItem, FeedPage, FeedSource, FetchParams};

/// Deadline and fallback around a source that must not block or fail a larger read
///
/// On timeout or error the page degrades to no items with the requested cursor
/// echoed back, so the next page retries from the same spot. A failed first
/// page (no cursor) therefore reads as exhausted for the rest of that pass.
#[derive(Debug, Clone)]
pub struct BestEffort<S> {
    inner: S,
    deadline: Duration,
}

impl<S: FeedSource> BestEffort<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: FeedSource> FeedSource for BestEffort<S> {
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError> {
        match tokio::time::timeout(self.deadline, self.inner.peek_latest()).await {
            Ok(Ok(item)) => Ok(item),
            Ok(Err(e)) => {
                tracing::warn!("best-effort peek failed: {}", e);
                Ok(None)
            }
            Err(_) => {
                tracing::warn!("{}", FeedError::Timeout(self.deadline));
                Ok(None)
            }
        }
    }

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError> {
        let cursor = params.cursor.clone();
        match tokio::time::timeout(self.deadline, self.inner.fetch(params)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => {
                tracing::warn!("best-effort fetch failed, serving empty page: {}", e);
                Ok(FeedPage {
                    cursor,
                    items: Vec::new(),
                })
            }
            Err(_) => {
                tracing::warn!(
                    "best-effort fetch, serving empty page: {}",
                    FeedError::Timeout(self.deadline)
                );
                Ok(FeedPage {
                    cursor,
                    items: Vec::new(),
                })
            }
        }
    }
}
