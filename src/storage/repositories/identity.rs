//! Identity repository backing the credential store
//!
//! All email lookups go through [`Identity::normalize_email`], so the
//! case-insensitive uniqueness invariant holds no matter which caller
//! reaches the store.

use crate::auth::identity::{Identity, NewIdentity, UpdateIdentity};
use crate::auth::roles::Role;
use crate::domain::{IdentityId, OrgId};
use crate::errors::{AssayGateError, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::instrument;

// Database row structure

#[derive(Debug, Clone, FromRow)]
struct IdentityRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub active: bool,
    pub superuser: bool,
    pub org_id: Option<String>,
    pub token_version: i64,
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const IDENTITY_COLUMNS: &str = "id, email, display_name, password_hash, role, active, superuser, \
     org_id, token_version, mfa_secret, mfa_enabled, last_login_at, created_at, updated_at";

// Repository trait

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Create a new identity. Duplicate emails surface as a conflict.
    async fn create_identity(&self, identity: NewIdentity) -> Result<Identity>;

    /// Get an identity by ID
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>>;

    /// Get an identity by email (normalized before lookup)
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// Update an identity's details
    async fn update_identity(&self, id: &IdentityId, update: UpdateIdentity) -> Result<Identity>;

    /// Replace the stored password hash and bump `token_version`, revoking
    /// every previously issued token in the same statement.
    async fn update_password(&self, id: &IdentityId, password_hash: String) -> Result<()>;

    /// Increment `token_version`, returning the new value
    async fn bump_token_version(&self, id: &IdentityId) -> Result<i64>;

    /// Stamp `last_login_at` with the current time
    async fn record_login(&self, id: &IdentityId) -> Result<()>;

    /// List identities (with pagination)
    async fn list_identities(&self, limit: i64, offset: i64) -> Result<Vec<Identity>>;

    /// Count total identities
    async fn count_identities(&self) -> Result<i64>;

    /// Delete an identity
    async fn delete_identity(&self, id: &IdentityId) -> Result<()>;
}

// SQLite implementation

#[derive(Debug, Clone)]
pub struct SqlxIdentityRepository {
    pool: DbPool,
}

impl SqlxIdentityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_identity(&self, row: IdentityRow) -> Result<Identity> {
        let role = Role::from_str(&row.role).map_err(|_| {
            AssayGateError::validation(format!("Unknown role '{}' in identity store", row.role))
        })?;

        Ok(Identity {
            id: IdentityId::from_string(row.id),
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role,
            active: row.active,
            superuser: row.superuser,
            org_id: row.org_id.map(OrgId::from_string),
            token_version: row.token_version,
            mfa_secret: row.mfa_secret,
            mfa_enabled: row.mfa_enabled,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl IdentityRepository for SqlxIdentityRepository {
    #[instrument(
        skip(self, identity),
        fields(identity_id = %identity.id, email = %identity.email),
        name = "db_create_identity"
    )]
    async fn create_identity(&self, identity: NewIdentity) -> Result<Identity> {
        let email = Identity::normalize_email(&identity.email);
        let role = identity.role.to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO identities
                (id, email, display_name, password_hash, role, active, superuser, org_id,
                 token_version, mfa_secret, mfa_enabled, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, NULL, 0, NULL, $9, $10)
            "#,
        )
        .bind(identity.id.as_str())
        .bind(&email)
        .bind(&identity.display_name)
        .bind(&identity.password_hash)
        .bind(&role)
        .bind(identity.active)
        .bind(identity.superuser)
        .bind(identity.org_id.as_ref().map(|org| org.as_str().to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.is_unique_violation() {
                    return AssayGateError::conflict(
                        format!("An identity with email '{}' already exists", email),
                        "identity",
                    );
                }
            }
            AssayGateError::Database {
                source: err,
                context: "Failed to create identity".to_string(),
            }
        })?;

        self.find_by_id(&identity.id)
            .await?
            .ok_or_else(|| AssayGateError::internal("Identity not found after creation"))
    }

    #[instrument(skip(self), fields(identity_id = %id), name = "db_find_identity")]
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM identities WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to fetch identity".to_string(),
        })?;

        row.map(|r| self.row_to_identity(r)).transpose()
    }

    #[instrument(skip(self), fields(email = %email), name = "db_find_identity_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let email = Identity::normalize_email(email);
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM identities WHERE email = $1",
            IDENTITY_COLUMNS
        ))
        .bind(&email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to fetch identity by email".to_string(),
        })?;

        row.map(|r| self.row_to_identity(r)).transpose()
    }

    #[instrument(skip(self, update), fields(identity_id = %id), name = "db_update_identity")]
    async fn update_identity(&self, id: &IdentityId, update: UpdateIdentity) -> Result<Identity> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("Identity", id.to_string()))?;

        let display_name = update.display_name.unwrap_or(current.display_name);
        let role = update.role.unwrap_or(current.role).to_string();
        let active = update.active.unwrap_or(current.active);
        let superuser = update.superuser.unwrap_or(current.superuser);
        let org_id = update.org_id.unwrap_or(current.org_id);
        let mfa_secret = update.mfa_secret.unwrap_or(current.mfa_secret);
        let mfa_enabled = update.mfa_enabled.unwrap_or(current.mfa_enabled);

        sqlx::query(
            r#"
            UPDATE identities
            SET display_name = $1, role = $2, active = $3, superuser = $4, org_id = $5,
                mfa_secret = $6, mfa_enabled = $7, updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(&display_name)
        .bind(&role)
        .bind(active)
        .bind(superuser)
        .bind(org_id.as_ref().map(|org| org.as_str().to_string()))
        .bind(&mfa_secret)
        .bind(mfa_enabled)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to update identity".to_string(),
        })?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AssayGateError::internal("Identity not found after update"))
    }

    #[instrument(skip(self, password_hash), fields(identity_id = %id), name = "db_update_password")]
    async fn update_password(&self, id: &IdentityId, password_hash: String) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET password_hash = $1, token_version = token_version + 1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to update password".to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(AssayGateError::not_found("Identity", id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(identity_id = %id), name = "db_bump_token_version")]
    async fn bump_token_version(&self, id: &IdentityId) -> Result<i64> {
        let version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE identities
            SET token_version = token_version + 1, updated_at = $1
            WHERE id = $2
            RETURNING token_version
            "#,
        )
        .bind(Utc::now())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to bump token version".to_string(),
        })?
        .ok_or_else(|| AssayGateError::not_found("Identity", id.to_string()))?;

        Ok(version)
    }

    #[instrument(skip(self), fields(identity_id = %id), name = "db_record_login")]
    async fn record_login(&self, id: &IdentityId) -> Result<()> {
        sqlx::query("UPDATE identities SET last_login_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| AssayGateError::Database {
                source: err,
                context: "Failed to record login".to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(limit = limit, offset = offset), name = "db_list_identities")]
    async fn list_identities(&self, limit: i64, offset: i64) -> Result<Vec<Identity>> {
        let rows = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM identities ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            IDENTITY_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to list identities".to_string(),
        })?;

        rows.into_iter().map(|r| self.row_to_identity(r)).collect()
    }

    #[instrument(skip(self), name = "db_count_identities")]
    async fn count_identities(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| AssayGateError::Database {
                source: err,
                context: "Failed to count identities".to_string(),
            })?;

        Ok(count)
    }

    #[instrument(skip(self), fields(identity_id = %id), name = "db_delete_identity")]
    async fn delete_identity(&self, id: &IdentityId) -> Result<()> {
        sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| AssayGateError::Database {
                source: err,
                context: "Failed to delete identity".to_string(),
            })?;

        Ok(())
    }
}
