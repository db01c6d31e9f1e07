//! # aegis-storage-sql
//!
//! SQLx/PostgreSQL implementations of the Aegis storage providers, with
//! versioned migrations.
//!
//! - Verify-and-invalidate runs as a conditional `UPDATE` so concurrent
//!   replays of the same verifier lose.
//! - Private JWK material is sealed with AES-256-GCM before it is written.
//! - Like the consent subsystem itself, consent rows reference clients by
//!   id; the configured [`aegis_storage::ClientStore`] hydrates them on
//!   read.

#![forbid(unsafe_code)]

pub mod client;
pub mod consent;
pub mod error;
pub mod keys;
pub mod migrate;
pub mod oauth2;
pub mod pool;

pub use client::SqlClientStore;
pub use consent::SqlConsentStore;
pub use keys::SqlKeyStore;
pub use migrate::create_schemas;
pub use oauth2::SqlOAuth2Store;
pub use pool::{create_pool, PoolConfig};
