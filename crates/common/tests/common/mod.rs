//! Shared test utilities for pipeline integration tests
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use common::agent::PrivateAgent;
use common::backend::memory::MemoryBackend;
use common::backend::Audience;
use common::feed::{FeedItem, FeedSource, FetchParams};
use common::item::ItemMetadata;
use common::posts::NewPost;
use common::testkit::memory_agent;
use common::types::Did;
use serde_json::{json, Map};

pub const OWNER: &str = "did:example:owner";
pub const ALICE: &str = "did:example:alice";
pub const BOB: &str = "did:example:bob";
pub const CAROL: &str = "did:example:carol";

/// A backend with an agent per account, every account holding a published keypair,
/// and the owner trusting `trusted`
pub async fn setup_circle(
    accounts: &[&str],
    trusted: &[&str],
) -> (MemoryBackend, Vec<PrivateAgent>) {
    let backend = MemoryBackend::new();
    let mut agents = Vec::with_capacity(accounts.len());
    for did in accounts {
        let agent = memory_agent(&backend, did);
        agent
            .key_store()
            .get_or_create_key_pair(&Did::from(*did))
            .await
            .unwrap();
        agents.push(agent);
    }
    backend.set_trusted_users(
        &Did::from(OWNER),
        trusted.iter().map(|d| Did::from(*d)).collect(),
    );
    (backend, agents)
}

pub fn post(author: &str, text: &str) -> NewPost {
    let mut body = Map::new();
    body.insert("text".to_string(), json!(text));
    NewPost {
        body,
        metadata: ItemMetadata::new(Did::from(author), Utc::now()),
    }
}

/// Everything `viewer` can read of `author`'s private posts
pub async fn read_private(viewer: &PrivateAgent, author: &str) -> Vec<FeedItem> {
    viewer
        .private_feed(Audience::Author(Did::from(author)))
        .fetch(FetchParams {
            cursor: None,
            limit: 100,
        })
        .await
        .unwrap()
        .items
}

pub fn texts(items: &[FeedItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.record["text"].as_str().unwrap().to_string())
        .collect()
}

pub fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}
