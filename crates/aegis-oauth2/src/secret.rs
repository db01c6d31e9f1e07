//! Client secret hashing.
//!
//! Secrets are stored as argon2id hashes; the plaintext is returned exactly
//! once, in the create response.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hashes a client secret.
///
/// # Errors
///
/// Returns an opaque error string if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format!("could not hash client secret: {e}"))
}

/// Verifies a client secret against its stored hash.
#[must_use]
pub fn verify_secret(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}
