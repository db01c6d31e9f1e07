//! In-memory key store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use aegis_model::{JsonWebKey, JsonWebKeySet};

use crate::error::{StorageError, StorageResult};
use crate::keys::KeyStore;

/// In-memory [`KeyStore`]. Keys are held unencrypted; at-rest encryption is
/// a property of the SQL store.
#[derive(Default)]
pub struct MemoryKeyStore {
    sets: RwLock<HashMap<String, JsonWebKeySet>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert(set: &mut JsonWebKeySet, key: &JsonWebKey) {
    set.keys.retain(|k| k.key_id() != key.key_id());
    set.keys.push(key.clone());
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get_key_set(&self, set: &str) -> StorageResult<JsonWebKeySet> {
        self.sets
            .read()
            .get(set)
            .cloned()
            .ok_or_else(|| StorageError::not_found("key set", set))
    }

    async fn add_key_set(&self, set: &str, keys: &JsonWebKeySet) -> StorageResult<()> {
        let mut sets = self.sets.write();
        let entry = sets.entry(set.to_string()).or_default();
        for key in &keys.keys {
            upsert(entry, key);
        }
        Ok(())
    }

    async fn add_key(&self, set: &str, key: &JsonWebKey) -> StorageResult<()> {
        let mut sets = self.sets.write();
        upsert(sets.entry(set.to_string()).or_default(), key);
        Ok(())
    }

    async fn get_key(&self, set: &str, kid: &str) -> StorageResult<JsonWebKey> {
        self.sets
            .read()
            .get(set)
            .and_then(|s| s.find(kid))
            .cloned()
            .ok_or_else(|| StorageError::not_found("key", format!("{set}/{kid}")))
    }

    async fn delete_key_set(&self, set: &str) -> StorageResult<()> {
        self.sets
            .write()
            .remove(set)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("key set", set))
    }

    async fn delete_key(&self, set: &str, kid: &str) -> StorageResult<()> {
        let mut sets = self.sets.write();
        let entry = sets
            .get_mut(set)
            .ok_or_else(|| StorageError::not_found("key set", set))?;

        let before = entry.keys.len();
        entry.keys.retain(|k| k.key_id() != kid);
        if entry.keys.len() == before {
            return Err(StorageError::not_found("key", format!("{set}/{kid}")));
        }
        Ok(())
    }
}
