//! In-memory store implementations.
//!
//! Used by the test suite and by `memory://` deployments. All state lives
//! behind `parking_lot` locks; the compare-and-set semantics of the
//! verify-and-invalidate and code-consumption operations hold because each
//! operation runs under a single write lock.

mod client;
mod consent;
mod keys;
mod oauth2;

pub use client::MemoryClientStore;
pub use consent::MemoryConsentStore;
pub use keys::MemoryKeyStore;
pub use oauth2::MemoryOAuth2Store;
