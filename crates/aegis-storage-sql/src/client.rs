//! PostgreSQL client store.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use aegis_model::Client;
use aegis_storage::{ClientStore, StorageError, StorageResult};

use crate::error::from_sqlx_error;

/// PostgreSQL [`ClientStore`].
pub struct SqlClientStore {
    pool: PgPool,
}

impl SqlClientStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for SqlClientStore {
    async fn create_client(&self, client: &Client) -> StorageResult<()> {
        sqlx::query("INSERT INTO clients (id, payload) VALUES ($1, $2)")
            .bind(&client.id)
            .bind(Json(client))
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("client", &client.id, e))?;
        Ok(())
    }

    async fn get_client(&self, id: &str) -> StorageResult<Client> {
        let row: Option<(Json<Client>,)> =
            sqlx::query_as("SELECT payload FROM clients WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| from_sqlx_error("client", id, e))?;

        row.map(|(payload,)| payload.0)
            .ok_or_else(|| StorageError::not_found("client", id))
    }

    async fn update_client(&self, client: &Client) -> StorageResult<()> {
        let result = sqlx::query("UPDATE clients SET payload = $2 WHERE id = $1")
            .bind(&client.id)
            .bind(Json(client))
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("client", &client.id, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("client", &client.id));
        }
        Ok(())
    }

    async fn delete_client(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("client", id, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("client", id));
        }
        Ok(())
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        let rows: Vec<(Json<Client>,)> =
            sqlx::query_as("SELECT payload FROM clients ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| from_sqlx_error("client", "all", e))?;

        Ok(rows.into_iter().map(|(payload,)| payload.0).collect())
    }
}
