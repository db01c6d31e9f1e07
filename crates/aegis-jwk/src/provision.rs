//! Signing key provisioning.

use thiserror::Error;
use tracing::{info, warn};

use aegis_model::JsonWebKey;
use aegis_storage::{KeyStore, StorageError};

use crate::generator::{generate_key_set, KeyGenError};

/// The key set whose `private:` key signs ID tokens and whose `public:` key
/// is served at the well-known JWKS endpoint. The name is kept for wire
/// compatibility with existing deployments.
pub const ID_TOKEN_KEY_SET: &str = "hydra.openid.id-token";

/// Errors raised while provisioning a signing key.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Storage failure while loading or persisting the set.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key generation failure.
    #[error(transparent)]
    Generator(#[from] KeyGenError),

    /// The key with the requested prefix could not be provisioned even
    /// after regenerating the set once.
    #[error("could not provision signing key '{prefix}' in set '{set}'")]
    CannotProvisionSigningKey {
        /// The key set name.
        set: String,
        /// The requested kid prefix.
        prefix: String,
    },
}

/// Idempotently provisions the signing key with the given kid `prefix`
/// (e.g. `private:`) in `set`.
///
/// If the set is missing or empty a fresh RS256 pair is generated and
/// persisted. If the set exists but carries no key with the prefix, it is
/// regenerated exactly once; this rotates the signing key, so it is logged
/// loudly. A second miss fails.
///
/// # Errors
///
/// Returns [`ProvisionError::CannotProvisionSigningKey`] if the key is still
/// missing after regeneration, or the underlying storage/generator error.
pub async fn ensure_signing_key(
    store: &dyn KeyStore,
    set: &str,
    prefix: &str,
) -> Result<JsonWebKey, ProvisionError> {
    let keys = match store.get_key_set(set).await {
        Ok(keys) if !keys.is_empty() => keys,
        Ok(_) | Err(StorageError::NotFound { .. }) => {
            info!(set, "key set does not exist yet, generating new key pair");
            let keys = generate_key_set("RS256", "")?;
            store.add_key_set(set, &keys).await?;
            keys
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(key) = keys.find_by_prefix(prefix) {
        return Ok(key.clone());
    }

    // The set exists but the requested half is gone. Regenerating replaces
    // the signing key, which invalidates previously issued ID tokens.
    warn!(
        set,
        prefix, "key with prefix not found in existing set, rotating key pair"
    );
    let keys = generate_key_set("RS256", "")?;
    store.add_key_set(set, &keys).await?;

    keys.find_by_prefix(prefix)
        .cloned()
        .ok_or_else(|| ProvisionError::CannotProvisionSigningKey {
            set: set.to_string(),
            prefix: prefix.to_string(),
        })
}
