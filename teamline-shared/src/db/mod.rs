/// Database access layer
///
/// - `pool`: PostgreSQL connection pool construction and health checks
/// - `migrations`: schema migration runner

pub mod migrations;
pub mod pool;

pub use migrations::{ensure_database_exists, run_migrations};
pub use pool::{close_pool, create_pool, health_check, DatabaseConfig};
