//! # aegis-jwk
//!
//! JSON Web Key handling for the Aegis authorization server:
//!
//! - Key generation for RS256, ES512, HS256 and HS512.
//! - Idempotent provisioning of the ID-token signing set.
//! - The `/keys` management API and the well-known JWKS endpoint.

#![forbid(unsafe_code)]

pub mod generator;
pub mod handler;
pub mod provision;

pub use generator::{generate_key_set, KeyGenError};
pub use handler::{jwk_router, JwkApiState};
pub use provision::{ensure_signing_key, ProvisionError, ID_TOKEN_KEY_SET};
