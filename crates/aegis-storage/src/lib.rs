//! # aegis-storage
//!
//! Storage provider traits for the Aegis authorization server, plus the
//! in-memory implementations used by tests and `memory://` deployments.
//!
//! ## Provider traits
//!
//! - [`ConsentStore`] - login/consent requests, handled outcomes,
//!   authentication sessions, previously granted consents.
//! - [`KeyStore`] - JSON Web Key sets.
//! - [`ClientStore`] - OAuth 2.0 client registrations.
//! - [`OAuth2Store`] - authorization codes and opaque tokens.
//!
//! All implementations must be thread-safe; the verify-and-invalidate
//! operations must be atomic so a verifier can be exchanged exactly once
//! across concurrent callers.

#![forbid(unsafe_code)]

pub mod client;
pub mod consent;
pub mod error;
pub mod keys;
pub mod memory;
pub mod oauth2;

pub use client::ClientStore;
pub use consent::ConsentStore;
pub use error::{StorageError, StorageResult};
pub use keys::KeyStore;
pub use memory::{MemoryClientStore, MemoryConsentStore, MemoryKeyStore, MemoryOAuth2Store};
pub use oauth2::OAuth2Store;
