//! `aegis migrate sql`

use aegis_storage_sql::{create_pool, create_schemas, PoolConfig};

use crate::cli::MigrateCommand;

/// Applies database schemas.
pub async fn run(command: MigrateCommand) -> anyhow::Result<()> {
    match command {
        MigrateCommand::Sql { dsn } => {
            if !dsn.starts_with("postgres://") && !dsn.starts_with("postgresql://") {
                anyhow::bail!("migrations require a postgres:// DSN");
            }

            let pool = create_pool(&PoolConfig::new(&dsn)).await?;
            let applied = create_schemas(&pool).await?;
            println!("schema is up to date, {applied} migrations applied");
            Ok(())
        }
    }
}
