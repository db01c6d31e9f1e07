//! SQLx error mapping.

use aegis_storage::StorageError;

/// PostgreSQL unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Maps a SQLx error onto the storage taxonomy.
pub fn from_sqlx_error(entity: &'static str, key: &str, err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::RowNotFound => StorageError::not_found(entity, key),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StorageError::duplicate(entity, key)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Connection(err.to_string())
        }
        _ => StorageError::Query(err.to_string()),
    }
}
