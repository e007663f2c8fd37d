//! # Storage and Persistence
//!
//! This module provides database connectivity and the persistence layer for
//! the AssayGate credential store and audit log.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use crate::config::DatabaseConfig;

pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations as run_db_migrations,
    validate_migrations, MigrationInfo,
};
pub use pool::{create_pool, DbPool};
pub use repositories::{
    AuditEvent, AuditLogEntry, AuditLogRepository, IdentityRepository, SqlxIdentityRepository,
};

use crate::errors::{AssayGateError, Result};

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    migrations::run_migrations(pool).await
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| AssayGateError::Database {
        source: e,
        context: "Database connectivity check failed".to_string(),
    })?;

    Ok(())
}
