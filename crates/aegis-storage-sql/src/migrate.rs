//! Schema migrations.

use sqlx::PgPool;
use tracing::info;

use aegis_storage::StorageError;

/// Applies all pending migrations and returns the total number of applied
/// migrations.
///
/// # Errors
///
/// Returns [`StorageError::Query`] if a migration fails.
pub async fn create_schemas(pool: &PgPool) -> Result<usize, StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StorageError::Query(format!("migration failed: {e}")))?;

    let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

    info!(applied, "database schema is up to date");
    #[allow(clippy::cast_sign_loss)]
    Ok(applied as usize)
}
