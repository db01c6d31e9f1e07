//! OAuth 2.0 code and token store provider trait.

use async_trait::async_trait;

use aegis_model::{AuthorizationCode, OAuth2Token};

use crate::error::StorageResult;

/// Durable store for authorization codes and opaque tokens.
///
/// Codes are single-use: `consume_authorization_code` is a compare-and-set
/// that deletes the code as it returns it, so a replayed code observes
/// `NotFound`.
#[async_trait]
pub trait OAuth2Store: Send + Sync {
    /// Persists a freshly issued authorization code.
    async fn create_authorization_code(&self, code: &AuthorizationCode) -> StorageResult<()>;

    /// Atomically consumes an authorization code, returning it exactly once.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` for unknown, expired, or already
    /// consumed codes.
    async fn consume_authorization_code(&self, code: &str) -> StorageResult<AuthorizationCode>;

    /// Persists an opaque token.
    async fn create_token(&self, token: &OAuth2Token) -> StorageResult<()>;

    /// Loads an opaque token by signature.
    async fn get_token(&self, signature: &str) -> StorageResult<OAuth2Token>;

    /// Marks an opaque token inactive. Revoking an unknown token is a no-op.
    async fn revoke_token(&self, signature: &str) -> StorageResult<()>;
}
