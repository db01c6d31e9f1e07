//! Key store provider trait.

use async_trait::async_trait;

use aegis_model::{JsonWebKey, JsonWebKeySet};

use crate::error::StorageResult;

/// Durable store for JSON Web Key sets.
///
/// SQL-backed implementations encrypt private key material at rest; the
/// in-memory store keeps keys as-is. Adding a key whose kid already exists
/// in the set replaces it.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Loads a key set by name.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn get_key_set(&self, set: &str) -> StorageResult<JsonWebKeySet>;

    /// Adds all keys of `keys` to the named set, creating it if needed.
    async fn add_key_set(&self, set: &str, keys: &JsonWebKeySet) -> StorageResult<()>;

    /// Adds a single key to the named set, creating the set if needed.
    async fn add_key(&self, set: &str, key: &JsonWebKey) -> StorageResult<()>;

    /// Loads a single key by set name and kid.
    async fn get_key(&self, set: &str, kid: &str) -> StorageResult<JsonWebKey>;

    /// Deletes a whole key set.
    async fn delete_key_set(&self, set: &str) -> StorageResult<()>;

    /// Deletes a single key from a set.
    async fn delete_key(&self, set: &str, kid: &str) -> StorageResult<()>;
}
