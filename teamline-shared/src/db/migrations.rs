/// Schema migration runner
///
/// Migrations live as SQL files under `teamline-shared/migrations/` and
/// are embedded at compile time via `sqlx::migrate!`. The API server
/// runs them on startup before accepting traffic.

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{info, warn};

/// Runs all pending migrations against the given pool
///
/// # Errors
///
/// Returns an error if a migration file fails to apply; the failing
/// migration is rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database migrations up to date");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Creates the database if it does not exist yet
///
/// Useful for development and test environments; production databases
/// are provisioned out of band.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    }
    Ok(())
}
