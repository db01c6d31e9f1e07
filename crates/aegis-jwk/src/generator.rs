//! Key generation.
//!
//! Asymmetric generators produce two keys per invocation, the private and
//! public halves, with kids `private:<id>` and `public:<id>`. Symmetric
//! generators produce a single `private:<id>` key. Both halves are marked
//! `use = "sig"`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p521::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use thiserror::Error;
use uuid::Uuid;

use aegis_model::{JsonWebKey, JsonWebKeySet};

/// RSA modulus size for generated RS256 keys.
const RSA_BITS: usize = 2048;

/// Errors raised during key generation.
#[derive(Debug, Error)]
pub enum KeyGenError {
    /// The requested algorithm has no generator.
    #[error("no generator for algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    Generation(String),
}

/// Generates a key set for the given algorithm.
///
/// `kid` names the generated pair; when empty a random UUID is used.
///
/// # Errors
///
/// Returns [`KeyGenError::UnsupportedAlgorithm`] for algorithms other than
/// `RS256`, `ES512`, `HS256` and `HS512`.
pub fn generate_key_set(alg: &str, kid: &str) -> Result<JsonWebKeySet, KeyGenError> {
    let id = if kid.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        kid.to_string()
    };

    match alg {
        "RS256" => generate_rs256(&id),
        "ES512" => generate_es512(&id),
        "HS256" => Ok(generate_hmac("HS256", &id, 32)),
        "HS512" => Ok(generate_hmac("HS512", &id, 64)),
        other => Err(KeyGenError::UnsupportedAlgorithm(other.to_string())),
    }
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_rs256(id: &str) -> Result<JsonWebKeySet, KeyGenError> {
    let mut rng = OsRng;
    let key = RsaPrivateKey::new(&mut rng, RSA_BITS)
        .map_err(|e| KeyGenError::Generation(format!("RSA keygen: {e}")))?;

    let n = b64(&key.n().to_bytes_be());
    let e = b64(&key.e().to_bytes_be());
    let primes = key.primes();

    let private = JsonWebKey {
        kty: "RSA".to_string(),
        kid: Some(format!("private:{id}")),
        key_use: Some("sig".to_string()),
        alg: Some("RS256".to_string()),
        n: Some(n.clone()),
        e: Some(e.clone()),
        d: Some(b64(&key.d().to_bytes_be())),
        p: Some(b64(&primes[0].to_bytes_be())),
        q: Some(b64(&primes[1].to_bytes_be())),
        ..JsonWebKey::default()
    };

    let public = JsonWebKey {
        kty: "RSA".to_string(),
        kid: Some(format!("public:{id}")),
        key_use: Some("sig".to_string()),
        alg: Some("RS256".to_string()),
        n: Some(n),
        e: Some(e),
        ..JsonWebKey::default()
    };

    Ok(JsonWebKeySet {
        keys: vec![private, public],
    })
}

fn generate_es512(id: &str) -> Result<JsonWebKeySet, KeyGenError> {
    let secret = p521::SecretKey::random(&mut OsRng);
    let point = secret.public_key().to_encoded_point(false);

    let x = point
        .x()
        .ok_or_else(|| KeyGenError::Generation("P-521 point missing x".to_string()))?;
    let y = point
        .y()
        .ok_or_else(|| KeyGenError::Generation("P-521 point missing y".to_string()))?;

    let private = JsonWebKey {
        kty: "EC".to_string(),
        kid: Some(format!("private:{id}")),
        key_use: Some("sig".to_string()),
        alg: Some("ES512".to_string()),
        crv: Some("P-521".to_string()),
        x: Some(b64(x)),
        y: Some(b64(y)),
        d: Some(b64(&secret.to_bytes())),
        ..JsonWebKey::default()
    };

    let public = JsonWebKey {
        kty: "EC".to_string(),
        kid: Some(format!("public:{id}")),
        key_use: Some("sig".to_string()),
        alg: Some("ES512".to_string()),
        crv: Some("P-521".to_string()),
        x: Some(b64(x)),
        y: Some(b64(y)),
        ..JsonWebKey::default()
    };

    Ok(JsonWebKeySet {
        keys: vec![private, public],
    })
}

fn generate_hmac(alg: &str, id: &str, len: usize) -> JsonWebKeySet {
    let key = JsonWebKey {
        kty: "oct".to_string(),
        kid: Some(format!("private:{id}")),
        key_use: Some("sig".to_string()),
        alg: Some(alg.to_string()),
        k: Some(b64(&aegis_crypto::random_bytes(len))),
        ..JsonWebKey::default()
    };

    JsonWebKeySet { keys: vec![key] }
}
