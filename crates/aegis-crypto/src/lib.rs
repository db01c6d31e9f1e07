//! # aegis-crypto
//!
//! Cryptographic primitives for the Aegis authorization server:
//!
//! - Secure random generation for challenges, verifiers, CSRF values and
//!   opaque token signatures.
//! - Key derivation from the system secret (HKDF-SHA256).
//! - Authenticated encryption (AES-256-GCM) for key material at rest.

#![forbid(unsafe_code)]

pub mod encryption;
pub mod random;

pub use encryption::{CryptoError, KeyRing, Sealer};
pub use random::{opaque_id, random_alphanumeric, random_base64url, random_bytes, token_secret};
