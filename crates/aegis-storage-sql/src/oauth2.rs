//! PostgreSQL OAuth 2.0 code and token store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;

use aegis_model::{AuthorizationCode, OAuth2Token};
use aegis_storage::{OAuth2Store, StorageError, StorageResult};

use crate::error::from_sqlx_error;

/// PostgreSQL [`OAuth2Store`].
pub struct SqlOAuth2Store {
    pool: PgPool,
}

impl SqlOAuth2Store {
    /// Creates a new store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuth2Store for SqlOAuth2Store {
    async fn create_authorization_code(&self, code: &AuthorizationCode) -> StorageResult<()> {
        sqlx::query("INSERT INTO oauth2_codes (code, payload, expires_at) VALUES ($1, $2, $3)")
            .bind(&code.code)
            .bind(Json(code))
            .bind(code.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("authorization code", &code.code, e))?;
        Ok(())
    }

    async fn consume_authorization_code(&self, code: &str) -> StorageResult<AuthorizationCode> {
        // The DELETE doubles as the compare-and-set: a replayed code finds
        // no row.
        let row: Option<(Json<AuthorizationCode>,)> = sqlx::query_as(
            "DELETE FROM oauth2_codes WHERE code = $1 AND expires_at > $2 RETURNING payload",
        )
        .bind(code)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("authorization code", code, e))?;

        row.map(|(payload,)| payload.0)
            .ok_or_else(|| StorageError::not_found("authorization code", code))
    }

    async fn create_token(&self, token: &OAuth2Token) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO oauth2_tokens (signature, kind, payload, expires_at, active)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token.signature)
        .bind(token.kind.as_str())
        .bind(Json(token))
        .bind(token.expires_at)
        .bind(token.active)
        .execute(&self.pool)
        .await
        .map_err(|e| from_sqlx_error("token", &token.signature, e))?;
        Ok(())
    }

    async fn get_token(&self, signature: &str) -> StorageResult<OAuth2Token> {
        let row: Option<(Json<OAuth2Token>, bool)> =
            sqlx::query_as("SELECT payload, active FROM oauth2_tokens WHERE signature = $1")
                .bind(signature)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| from_sqlx_error("token", signature, e))?;

        // The column is authoritative for revocation state.
        row.map(|(payload, active)| OAuth2Token {
            active,
            ..payload.0
        })
        .ok_or_else(|| StorageError::not_found("token", signature))
    }

    async fn revoke_token(&self, signature: &str) -> StorageResult<()> {
        sqlx::query("UPDATE oauth2_tokens SET active = FALSE WHERE signature = $1")
            .bind(signature)
            .execute(&self.pool)
            .await
            .map_err(|e| from_sqlx_error("token", signature, e))?;
        Ok(())
    }
}
