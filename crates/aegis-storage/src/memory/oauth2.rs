//! In-memory OAuth 2.0 code and token store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use aegis_model::{AuthorizationCode, OAuth2Token};

use crate::error::{StorageError, StorageResult};
use crate::oauth2::OAuth2Store;

/// In-memory [`OAuth2Store`].
#[derive(Default)]
pub struct MemoryOAuth2Store {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
    tokens: RwLock<HashMap<String, OAuth2Token>>,
}

impl MemoryOAuth2Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuth2Store for MemoryOAuth2Store {
    async fn create_authorization_code(&self, code: &AuthorizationCode) -> StorageResult<()> {
        self.codes.write().insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_authorization_code(&self, code: &str) -> StorageResult<AuthorizationCode> {
        // Removal under the write lock makes the code single-use.
        let stored = self
            .codes
            .write()
            .remove(code)
            .ok_or_else(|| StorageError::not_found("authorization code", code))?;

        if stored.expires_at < Utc::now() {
            return Err(StorageError::not_found("authorization code", code));
        }
        Ok(stored)
    }

    async fn create_token(&self, token: &OAuth2Token) -> StorageResult<()> {
        self.tokens
            .write()
            .insert(token.signature.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, signature: &str) -> StorageResult<OAuth2Token> {
        self.tokens
            .read()
            .get(signature)
            .cloned()
            .ok_or_else(|| StorageError::not_found("token", signature))
    }

    async fn revoke_token(&self, signature: &str) -> StorageResult<()> {
        if let Some(token) = self.tokens.write().get_mut(signature) {
            token.active = false;
        }
        Ok(())
    }
}
