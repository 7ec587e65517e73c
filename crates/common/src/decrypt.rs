//! # Batch decryption
//!
//! Turns a page of [`EncryptedItem`]s plus the viewer's session key entries
//! into the subset the viewer can read. Failures are isolated per item:
//!
//! - an item whose session has no key entry is not shared with the viewer and is skipped
//! - a DEK that fails to unwrap excludes every item of that session, and only those
//! - a body that fails to decrypt (or parse) excludes only that item
//!
//! Unwrapping a DEK is the expensive asymmetric step, so it runs at most once
//! per session per call, failures included.

use std::collections::HashMap;

use serde_json::Value;

use crate::crypto::cipher;
use crate::crypto::{Dek, SecretKey, WrappedDek};
use crate::item::{DecryptedItem, EncryptedItem, SessionKeyEntry};
use crate::types::{ItemId, SessionId};

#[derive(Debug, Clone)]
pub struct BatchDecryptor {
    secret_key: SecretKey,
}

impl BatchDecryptor {
    pub fn new(secret_key: SecretKey) -> Self {
        Self { secret_key }
    }

    /// Decrypt every readable item to its plaintext bytes
    pub fn decrypt_batch(
        &self,
        items: &[EncryptedItem],
        session_keys: &[SessionKeyEntry],
    ) -> HashMap<ItemId, Vec<u8>> {
        let mut deks = SessionDeks::new(session_keys);
        let mut out = HashMap::with_capacity(items.len());
        for item in items {
            if let Some(plaintext) = self.decrypt_one(item, &mut deks) {
                out.insert(item.id.clone(), plaintext);
            }
        }
        tracing::debug!(
            "decrypted {} of {} items across {} sessions",
            out.len(),
            items.len(),
            deks.unwraps
        );
        out
    }

    /// Decrypt readable items and merge them with their metadata, keeping input order
    pub fn decrypt_items(
        &self,
        items: &[EncryptedItem],
        session_keys: &[SessionKeyEntry],
    ) -> Vec<DecryptedItem> {
        let mut deks = SessionDeks::new(session_keys);
        items
            .iter()
            .filter_map(|item| {
                let plaintext = self.decrypt_one(item, &mut deks)?;
                let merged = serde_json::from_slice::<Value>(&plaintext)
                    .and_then(|body| DecryptedItem::merge(item, body));
                match merged {
                    Ok(decrypted) => Some(decrypted),
                    Err(e) => {
                        tracing::debug!("excluding item {}: unreadable body: {}", item.id, e);
                        None
                    }
                }
            })
            .collect()
    }

    fn decrypt_one(&self, item: &EncryptedItem, deks: &mut SessionDeks<'_>) -> Option<Vec<u8>> {
        let dek = deks.dek(item.session_id, &self.secret_key)?;
        match cipher::decrypt_bytes(&item.cipher_text, dek) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                tracing::debug!("excluding item {}: {}", item.id, e);
                None
            }
        }
    }
}

/// Per-call memo of unwrapped session DEKs
struct SessionDeks<'a> {
    entries: HashMap<SessionId, &'a WrappedDek>,
    unwrapped: HashMap<SessionId, Option<Dek>>,
    unwraps: usize,
}

impl<'a> SessionDeks<'a> {
    fn new(session_keys: &'a [SessionKeyEntry]) -> Self {
        let mut entries = HashMap::with_capacity(session_keys.len());
        for entry in session_keys {
            entries
                .entry(entry.session_id)
                .or_insert(&entry.encrypted_dek);
        }
        Self {
            entries,
            unwrapped: HashMap::new(),
            unwraps: 0,
        }
    }

    fn dek(&mut self, session_id: SessionId, secret_key: &SecretKey) -> Option<&Dek> {
        let wrapped = self.entries.get(&session_id).copied()?;
        if !self.unwrapped.contains_key(&session_id) {
            self.unwraps += 1;
            let dek = match cipher::decrypt_dek(wrapped, secret_key) {
                Ok(dek) => Some(dek),
                Err(e) => {
                    tracing::debug!("cannot unwrap dek for session {}: {}", session_id, e);
                    None
                }
            };
            self.unwrapped.insert(session_id, dek);
        }
        self.unwrapped.get(&session_id).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::item::ItemMetadata;
    use crate::types::Did;

    struct Fixture {
        secret_key: SecretKey,
        key_pair_id: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                secret_key: SecretKey::generate(),
                key_pair_id: Uuid::new_v4(),
            }
        }

        fn session(&self) -> (SessionKeyEntry, Dek) {
            let dek = cipher::generate_dek();
            let entry = SessionKeyEntry {
                session_id: Uuid::new_v4(),
                encrypted_dek: cipher::encrypt_dek(&dek, &self.secret_key.public()).unwrap(),
                key_pair_id: self.key_pair_id,
            };
            (entry, dek)
        }
    }

    fn item(id: &str, session_id: SessionId, dek: &Dek, body: Value) -> EncryptedItem {
        EncryptedItem {
            id: id.to_string(),
            session_id,
            cipher_text: cipher::encrypt_content(&body, dek).unwrap(),
            metadata: ItemMetadata::new(Did::from("did:example:alice"), Utc::now()),
        }
    }

    #[test]
    fn test_item_without_session_entry_is_excluded() {
        let fixture = Fixture::new();
        let (sx, dek_x) = fixture.session();
        let dek_y = cipher::generate_dek();

        let items = vec![
            item("1", sx.session_id, &dek_x, json!({ "text": "one" })),
            item("2", Uuid::new_v4(), &dek_y, json!({ "text": "two" })),
        ];
        let result = BatchDecryptor::new(fixture.secret_key.clone()).decrypt_batch(&items, &[sx]);

        assert_eq!(result.len(), 1);
        let body: Value = serde_json::from_slice(&result["1"]).unwrap();
        assert_eq!(body, json!({ "text": "one" }));
    }

    #[test]
    fn test_result_is_independent_of_order() {
        let fixture = Fixture::new();
        let (s1, dek1) = fixture.session();
        let (s2, dek2) = fixture.session();
        let stranger = cipher::generate_dek();

        let mut items = vec![
            item("a", s1.session_id, &dek1, json!({})),
            item("b", s2.session_id, &dek2, json!({})),
            item("c", Uuid::new_v4(), &stranger, json!({})),
            item("d", s1.session_id, &dek1, json!({})),
        ];
        let keys = vec![s1, s2];
        let decryptor = BatchDecryptor::new(fixture.secret_key.clone());

        let forward = decryptor.decrypt_batch(&items, &keys);
        items.reverse();
        let backward = decryptor.decrypt_batch(&items, &keys);

        assert_eq!(forward.len(), 3);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_failed_unwrap_excludes_only_that_session() {
        let fixture = Fixture::new();
        let (good, good_dek) = fixture.session();
        // wrapped for somebody else's key
        let other = Fixture::new();
        let (bad, bad_dek) = other.session();

        let items = vec![
            item("g1", good.session_id, &good_dek, json!({})),
            item("b1", bad.session_id, &bad_dek, json!({})),
            item("b2", bad.session_id, &bad_dek, json!({})),
            item("g2", good.session_id, &good_dek, json!({})),
        ];
        let keys = vec![good, bad];
        let decryptor = BatchDecryptor::new(fixture.secret_key.clone());

        let mut deks = SessionDeks::new(&keys);
        let readable: Vec<_> = items
            .iter()
            .filter_map(|i| decryptor.decrypt_one(i, &mut deks).map(|_| i.id.clone()))
            .collect();

        assert_eq!(readable, vec!["g1".to_string(), "g2".to_string()]);
        // one unwrap per distinct session, the failed one included
        assert_eq!(deks.unwraps, 2);
    }

    #[test]
    fn test_tampered_item_is_isolated() {
        let fixture = Fixture::new();
        let (entry, dek) = fixture.session();
        let mut tampered = item("t", entry.session_id, &dek, json!({ "text": "x" }));
        tampered.cipher_text[20] ^= 0x01;
        let items = vec![tampered, item("ok", entry.session_id, &dek, json!({ "text": "y" }))];

        let decrypted =
            BatchDecryptor::new(fixture.secret_key.clone()).decrypt_items(&items, &[entry]);
        assert_eq!(decrypted.len(), 1);
        assert_eq!(decrypted[0].id, "ok");
        assert_eq!(decrypted[0].record["text"], json!("y"));
        assert_eq!(decrypted[0].record["author"], json!("did:example:alice"));
    }
}
