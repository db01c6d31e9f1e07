//! PostgreSQL key store.
//!
//! Each key is serialized to JSON, sealed with AES-256-GCM and stored
//! base64-encoded. Keys never touch the database in plaintext.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sqlx::PgPool;

use aegis_crypto::Sealer;
use aegis_model::{JsonWebKey, JsonWebKeySet};
use aegis_storage::{KeyStore, StorageError, StorageResult};

use crate::error::from_sqlx_error;

/// PostgreSQL [`KeyStore`] with at-rest encryption.
pub struct SqlKeyStore {
    pool: PgPool,
    sealer: Sealer,
}

impl SqlKeyStore {
    /// Creates a store sealing keys with the given sealer.
    #[must_use]
    pub fn new(pool: PgPool, sealer: Sealer) -> Self {
        Self { pool, sealer }
    }

    fn seal_key(&self, key: &JsonWebKey) -> StorageResult<String> {
        let plain = serde_json::to_vec(key)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self
            .sealer
            .seal(&plain)
            .map_err(|e| StorageError::Internal(format!("key sealing failed: {e}")))?;
        Ok(STANDARD.encode(sealed))
    }

    fn open_key(&self, data: &str) -> StorageResult<JsonWebKey> {
        let sealed = STANDARD
            .decode(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let plain = self
            .sealer
            .open(&sealed)
            .map_err(|e| StorageError::Internal(format!("key unsealing failed: {e}")))?;
        serde_json::from_slice(&plain).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn upsert_key(&self, set: &str, key: &JsonWebKey) -> StorageResult<()> {
        let sealed = self.seal_key(key)?;
        sqlx::query(
            r"INSERT INTO jwk (set_name, kid, key_data)
              VALUES ($1, $2, $3)
              ON CONFLICT (set_name, kid) DO UPDATE SET key_data = EXCLUDED.key_data",
        )
        .bind(set)
        .bind(key.key_id())
        .bind(sealed)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("key", key.key_id(), e))?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for SqlKeyStore {
    async fn get_key_set(&self, set: &str) -> StorageResult<JsonWebKeySet> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT key_data FROM jwk WHERE set_name = $1 ORDER BY created_at")
                .bind(set)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| from_sqlx_error("key set", set, e))?;

        if rows.is_empty() {
            return Err(StorageError::not_found("key set", set));
        }

        let mut keys = Vec::with_capacity(rows.len());
        for (data,) in rows {
            keys.push(self.open_key(&data)?);
        }
        Ok(JsonWebKeySet { keys })
    }

    async fn add_key_set(&self, set: &str, keys: &JsonWebKeySet) -> StorageResult<()> {
        for key in &keys.keys {
            self.upsert_key(set, key).await?;
        }
        Ok(())
    }

    async fn add_key(&self, set: &str, key: &JsonWebKey) -> StorageResult<()> {
        self.upsert_key(set, key).await
    }

    async fn get_key(&self, set: &str, kid: &str) -> StorageResult<JsonWebKey> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT key_data FROM jwk WHERE set_name = $1 AND kid = $2")
                .bind(set)
                .bind(kid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| from_sqlx_error("key", kid, e))?;

        let (data,) =
            row.ok_or_else(|| StorageError::not_found("key", format!("{set}/{kid}")))?;
        self.open_key(&data)
    }

    async fn delete_key_set(&self, set: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM jwk WHERE set_name = $1")
            .bind(set)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("key set", set, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("key set", set));
        }
        Ok(())
    }

    async fn delete_key(&self, set: &str, kid: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM jwk WHERE set_name = $1 AND kid = $2")
            .bind(set)
            .bind(kid)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("key", kid, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("key", format!("{set}/{kid}")));
        }
        Ok(())
    }
}
