//! Caching for trusted-circle lookups
//!
//! Resolving a trusted circle is a network call that several consumers repeat
//! for the same owner, so results go through an injected [`TrustedCircleCache`].
//! There is no invalidation beyond the TTL and explicit [`TrustedCircleCache::invalidate`].

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::types::Did;

/// Cache of trusted circles keyed by owner
pub trait TrustedCircleCache: Send + Sync + std::fmt::Debug {
    fn get(&self, owner: &Did) -> Option<Vec<Did>>;
    fn set(&self, owner: &Did, trusted: Vec<Did>);
    fn invalidate(&self, owner: &Did);
}

/// TTL-bounded in-memory cache
#[derive(Debug)]
pub struct MemoryTrustedCircleCache {
    ttl: Duration,
    entries: Mutex<HashMap<Did, (Instant, Vec<Did>)>>,
}

impl MemoryTrustedCircleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl TrustedCircleCache for MemoryTrustedCircleCache {
    fn get(&self, owner: &Did) -> Option<Vec<Did>> {
        let mut entries = self.entries.lock();
        match entries.get(owner) {
            Some((cached_at, trusted)) if cached_at.elapsed() < self.ttl => Some(trusted.clone()),
            Some(_) => {
                entries.remove(owner);
                None
            }
            None => None,
        }
    }

    fn set(&self, owner: &Did, trusted: Vec<Did>) {
        self.entries
            .lock()
            .insert(owner.clone(), (Instant::now(), trusted));
    }

    fn invalidate(&self, owner: &Did) {
        self.entries.lock().remove(owner);
    }
}

/// Opaque persisted key-value storage owned by the embedding application
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCircle {
    cached_at: DateTime<Utc>,
    trusted: Vec<Did>,
}

/// Trusted-circle cache stored as JSON in a [`KeyValueStore`]
///
/// Entries that no longer parse, or have expired, read as a miss.
#[derive(Debug)]
pub struct PersistedTrustedCircleCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: KeyValueStore> PersistedTrustedCircleCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(owner: &Did) -> String {
        format!("trusted-circle:{}", owner)
    }
}

impl<S: KeyValueStore> TrustedCircleCache for PersistedTrustedCircleCache<S> {
    fn get(&self, owner: &Did) -> Option<Vec<Did>> {
        let raw = self.store.get(&Self::key(owner))?;
        let persisted: PersistedCircle = match serde_json::from_str(&raw) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!("discarding unreadable trusted circle for {}: {}", owner, e);
                self.store.remove(&Self::key(owner));
                return None;
            }
        };

        let age = Utc::now()
            .signed_duration_since(persisted.cached_at)
            .to_std()
            .unwrap_or_default();
        if age >= self.ttl {
            return None;
        }
        Some(persisted.trusted)
    }

    fn set(&self, owner: &Did, trusted: Vec<Did>) {
        let persisted = PersistedCircle {
            cached_at: Utc::now(),
            trusted,
        };
        match serde_json::to_string(&persisted) {
            Ok(raw) => self.store.set(&Self::key(owner), raw),
            Err(e) => tracing::warn!("failed to persist trusted circle for {}: {}", owner, e),
        }
    }

    fn invalidate(&self, owner: &Did) {
        self.store.remove(&Self::key(owner));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dids(names: &[&str]) -> Vec<Did> {
        names.iter().map(|n| Did::from(*n)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires() {
        let cache = MemoryTrustedCircleCache::new(Duration::from_secs(60));
        let owner = Did::from("did:example:alice");
        cache.set(&owner, dids(&["did:example:bob"]));
        assert_eq!(cache.get(&owner), Some(dids(&["did:example:bob"])));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&owner), None);
    }

    #[test]
    fn test_memory_cache_invalidate() {
        let cache = MemoryTrustedCircleCache::new(Duration::from_secs(60));
        let owner = Did::from("did:example:alice");
        cache.set(&owner, Vec::new());
        cache.invalidate(&owner);
        assert_eq!(cache.get(&owner), None);
    }

    #[test]
    fn test_persisted_cache_round_trip() {
        let cache =
            PersistedTrustedCircleCache::new(MemoryKeyValueStore::default(), Duration::from_secs(60));
        let owner = Did::from("did:example:alice");
        cache.set(&owner, dids(&["did:example:bob", "did:example:carol"]));
        assert_eq!(
            cache.get(&owner),
            Some(dids(&["did:example:bob", "did:example:carol"]))
        );
    }

    #[test]
    fn test_persisted_cache_corrupt_entry_is_a_miss() {
        let store = MemoryKeyValueStore::default();
        store.set("trusted-circle:did:example:alice", "{not json".to_string());
        let cache = PersistedTrustedCircleCache::new(store, Duration::from_secs(60));

        assert_eq!(cache.get(&Did::from("did:example:alice")), None);
        assert!(cache.store.get("trusted-circle:did:example:alice").is_none());
    }

    #[test]
    fn test_persisted_cache_stale_entry_is_a_miss() {
        let store = MemoryKeyValueStore::default();
        let stale = PersistedCircle {
            cached_at: Utc::now() - chrono::Duration::hours(1),
            trusted: dids(&["did:example:bob"]),
        };
        store.set(
            "trusted-circle:did:example:alice",
            serde_json::to_string(&stale).unwrap(),
        );
        let cache = PersistedTrustedCircleCache::new(store, Duration::from_secs(60));
        assert_eq!(cache.get(&Did::from("did:example:alice")), None);
    }
}
