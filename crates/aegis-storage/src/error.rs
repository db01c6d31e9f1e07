//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found. Also returned for replayed or expired verifiers.
    #[error("{entity} not found: '{key}'")]
    NotFound {
        /// Type of entity (e.g. "login request", "key set").
        entity: &'static str,
        /// Lookup key.
        key: String,
    },

    /// Unique constraint violation.
    #[error("{entity} already exists: '{key}'")]
    Duplicate {
        /// Type of entity.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// The write violates a domain invariant.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Database connection error.
    #[error("storage connection error: {0}")]
    Connection(String),

    /// Database query error.
    #[error("storage query error: {0}")]
    Query(String),

    /// Serialization error while mapping rows.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// Internal storage error.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Creates a duplicate error.
    #[must_use]
    pub fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            key: key.into(),
        }
    }

    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is a duplicate error.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Checks if this is an invariant violation.
    #[must_use]
    pub const fn is_invalid_data(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
