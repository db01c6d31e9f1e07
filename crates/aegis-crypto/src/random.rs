//! Cryptographically secure random generation.
//!
//! Challenges, verifiers and CSRF values are opaque identifiers that must be
//! unguessable; everything here uses the thread-local CSPRNG.

use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};

/// Generates `len` cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string of the given length.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates an opaque identifier for challenges, verifiers and CSRF values.
///
/// 32 alphanumeric characters carry roughly 190 bits of entropy, comfortably
/// above the 128-bit floor these identifiers require.
#[must_use]
pub fn opaque_id() -> String {
    random_alphanumeric(32)
}

/// Generates an opaque token secret (authorization codes, access and refresh
/// tokens in the `opaque` strategy).
#[must_use]
pub fn token_secret() -> String {
    random_alphanumeric(48)
}

/// Generates a URL-safe base64-encoded random string from `byte_len` bytes.
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    let bytes = random_bytes(byte_len);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
