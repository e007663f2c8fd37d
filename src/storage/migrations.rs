//! # Database Migration Management
//!
//! Schema evolution through SQL embedded in the binary. Each migration runs
//! once, inside its own transaction, and is recorded in a tracking table
//! together with a checksum of its SQL so later releases can detect drift.
//! In-memory test databases bootstrap the exact production schema this way.

use crate::errors::{AssayGateError, Result};
use crate::storage::DbPool;
use serde::Serialize;
use tracing::{error, info, warn};

struct Migration {
    version: i64,
    label: &'static str,
    sql: &'static str,
}

/// Ordered migration set; never reorder or edit an entry after release,
/// append a new version instead.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        label: "create_identities_table",
        sql: r#"
            CREATE TABLE identities (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL COLLATE NOCASE,
                display_name TEXT NOT NULL,
                password_hash TEXT,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                superuser INTEGER NOT NULL DEFAULT 0,
                org_id TEXT,
                token_version INTEGER NOT NULL DEFAULT 0,
                mfa_secret TEXT,
                mfa_enabled INTEGER NOT NULL DEFAULT 0,
                last_login_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX idx_identities_email ON identities (email);
            CREATE INDEX idx_identities_org_id ON identities (org_id);
            CREATE INDEX idx_identities_role ON identities (role);
        "#,
    },
    Migration {
        version: 2,
        label: "create_audit_log_table",
        sql: r#"
            CREATE TABLE audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action TEXT NOT NULL,
                identity_id TEXT,
                email TEXT,
                backend TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                client_ip TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX idx_audit_log_action ON audit_log (action);
            CREATE INDEX idx_audit_log_identity_id ON audit_log (identity_id);
            CREATE INDEX idx_audit_log_created_at ON audit_log (created_at);
        "#,
    },
];

/// One row of the migration tracking table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub checksum: String,
    pub execution_time_ms: i64,
    pub installed_on: chrono::DateTime<chrono::Utc>,
}

/// Apply every migration that has not been recorded yet. Idempotent: a
/// second call against the same database is a no-op.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    ensure_tracking_table(pool).await?;
    let applied = applied_versions(pool).await?;

    let pending: Vec<&Migration> =
        MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)).collect();
    if pending.is_empty() {
        info!("Schema up to date, no pending migrations");
        return Ok(());
    }

    for migration in &pending {
        apply_one(pool, migration).await?;
    }
    info!(count = pending.len(), "Applied pending migrations");

    Ok(())
}

async fn apply_one(pool: &DbPool, migration: &Migration) -> Result<()> {
    info!(version = migration.version, label = migration.label, "Applying migration");
    let started = std::time::Instant::now();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AssayGateError::database(e, "could not open migration transaction"))?;

    // raw_sql: each migration holds several statements
    if let Err(e) = sqlx::raw_sql(migration.sql).execute(&mut *tx).await {
        error!(version = migration.version, label = migration.label, error = %e, "Migration failed");
        return Err(AssayGateError::database(e, format!("migration {} failed", migration.label)));
    }

    sqlx::query(
        "INSERT INTO _assaygate_migrations \
         (version, description, checksum, execution_time_ms, installed_on) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(migration.version)
    .bind(migration.label)
    .bind(sql_checksum(migration.sql))
    .bind(started.elapsed().as_millis() as i64)
    .bind(chrono::Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| AssayGateError::database(e, format!("could not record {}", migration.label)))?;

    tx.commit()
        .await
        .map_err(|e| AssayGateError::database(e, "could not commit migration transaction"))?;

    info!(
        version = migration.version,
        label = migration.label,
        elapsed_ms = started.elapsed().as_millis() as i64,
        "Migration applied"
    );
    Ok(())
}

async fn ensure_tracking_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _assaygate_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            checksum TEXT NOT NULL,
            execution_time_ms BIGINT NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| AssayGateError::database(e, "could not create migration tracking table"))?;

    Ok(())
}

async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let fetched = sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _assaygate_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await;

    match fetched {
        Ok(versions) => Ok(versions),
        Err(e) if is_missing_tracking_table(&e) => Ok(Vec::new()),
        Err(e) => Err(AssayGateError::database(e, "could not read applied migrations")),
    }
}

// Only hit when a read-side helper runs before the first run_migrations.
fn is_missing_tracking_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("no such table: _assaygate_migrations"))
}

/// Stable fingerprint of a migration's SQL, stored alongside it.
fn sql_checksum(sql: &str) -> String {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Check that the database and the embedded set agree: every embedded
/// migration applied, nothing extra recorded, and no checksum drift.
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    let recorded = list_applied_migrations(pool).await?;

    for migration in MIGRATIONS {
        match recorded.iter().find(|r| r.version == migration.version) {
            None => {
                warn!(version = migration.version, "Migration not applied");
                return Ok(false);
            }
            Some(row) if row.checksum != sql_checksum(migration.sql) => {
                warn!(version = migration.version, "Migration checksum drift");
                return Ok(false);
            }
            Some(_) => {}
        }
    }

    for row in &recorded {
        if !MIGRATIONS.iter().any(|m| m.version == row.version) {
            warn!(version = row.version, "Database records a migration this build does not know");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Highest applied version, 0 for a fresh database.
pub async fn get_migration_version(pool: &DbPool) -> Result<i64> {
    Ok(applied_versions(pool).await?.into_iter().max().unwrap_or(0))
}

/// Everything the tracking table knows, oldest first.
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let fetched = sqlx::query_as::<_, MigrationInfo>(
        "SELECT version, description, checksum, execution_time_ms, installed_on \
         FROM _assaygate_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await;

    match fetched {
        Ok(rows) => Ok(rows),
        Err(e) if is_missing_tracking_table(&e) => Ok(Vec::new()),
        Err(e) => Err(AssayGateError::database(e, "could not list applied migrations")),
    }
}
