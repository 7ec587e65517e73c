//! Scripted pieces for exercising the pipeline in-process
//!
//! - [`VecFeedSource`]: a feed over a fixed list of items, with call counters,
//!   an optional artificial delay and a failure switch
//! - [`memory_agent`]: a [`PrivateAgent`] wired to a [`MemoryBackend`]
//!
//! # Example
//!
//! ```rust,ignore
//! use common::backend::memory::MemoryBackend;
//! use common::testkit::{memory_agent, VecFeedSource};
//!
//! let backend = MemoryBackend::new();
//! let alice = memory_agent(&backend, "did:example:alice");
//! let feed = alice.merged_feed(Audience::Everyone, VecFeedSource::new(public_items));
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map};

use crate::agent::PrivateAgent;
use crate::backend::memory::MemoryBackend;
use crate::config::PipelineConfig;
use crate::feed::{FeedError, FeedItem, FeedPage, FeedSource, FetchParams, Visibility};
use crate::session::MemoryTrustedCircleCache;
use crate::types::Did;

/// Feed over a fixed item list, paginated by decimal offset cursors
#[derive(Debug, Default)]
pub struct VecFeedSource {
    items: Vec<FeedItem>,
    delay: Option<Duration>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    peeks: AtomicUsize,
}

impl VecFeedSource {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Sleep this long before answering any call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn peek_count(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }

    async fn pause_or_fail(&self) -> Result<(), FeedError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("scripted failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for VecFeedSource {
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        self.pause_or_fail().await?;
        Ok(self.items.first().cloned())
    }

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pause_or_fail().await?;

        let offset = match params.cursor.as_deref() {
            None => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| FeedError::InvalidCursor(cursor.to_string()))?,
        };
        let items: Vec<FeedItem> = self
            .items
            .iter()
            .skip(offset)
            .take(params.limit)
            .cloned()
            .collect();
        let next = offset + items.len();
        let cursor = (next < self.items.len()).then(|| next.to_string());
        Ok(FeedPage { cursor, items })
    }
}

/// A public feed item with a `text` record
pub fn public_item(id: &str, author: &str, text: &str, created_at: DateTime<Utc>) -> FeedItem {
    let mut record = Map::new();
    record.insert("text".to_string(), json!(text));
    FeedItem {
        id: id.to_string(),
        author: Did::from(author),
        created_at,
        record,
        visibility: Visibility::Public,
    }
}

/// A [`PrivateAgent`] for `did` over `backend`, with default config
pub fn memory_agent(backend: &MemoryBackend, did: &str) -> PrivateAgent {
    memory_agent_with_config(backend, did, PipelineConfig::default())
}

pub fn memory_agent_with_config(
    backend: &MemoryBackend,
    did: &str,
    config: PipelineConfig,
) -> PrivateAgent {
    let cache = Arc::new(MemoryTrustedCircleCache::new(config.trusted_circle_ttl()));
    let services = backend.client(did).services(cache);
    PrivateAgent::new(Did::from(did), services, config)
}
