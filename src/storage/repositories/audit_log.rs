//! Audit log repository for recording authentication lifecycle events
//!
//! Every security-relevant transition (login success/failure, registration,
//! password change, sign-out-everywhere, admin lifecycle actions) lands here
//! with enough context to answer "who did what, when, from where".

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::errors::{AssayGateError, Result};
use crate::storage::DbPool;

/// Audit event descriptor for authentication activity logging.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub identity_id: Option<String>,
    pub email: Option<String>,
    pub backend: Option<String>,
    pub metadata: serde_json::Value,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEvent {
    pub fn auth(
        action: &str,
        identity_id: Option<&str>,
        email: Option<&str>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            action: action.to_string(),
            identity_id: identity_id.map(|value| value.to_string()),
            email: email.map(|value| value.to_string()),
            backend: None,
            metadata,
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = Some(backend.to_string());
        self
    }

    pub fn with_client_context(
        mut self,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }
}

/// A recorded audit log entry
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub identity_id: Option<String>,
    pub email: Option<String>,
    pub backend: Option<String>,
    pub metadata: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for authentication audit events.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record an authentication-related audit event.
    pub async fn record_auth_event(&self, event: AuditEvent) -> Result<()> {
        let metadata_json = serde_json::to_string(&event.metadata).map_err(|err| {
            AssayGateError::validation(format!("Invalid audit metadata JSON: {}", err))
        })?;

        sqlx::query(
            "INSERT INTO audit_log (action, identity_id, email, backend, metadata, client_ip, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.action.as_str())
        .bind(event.identity_id.as_deref())
        .bind(event.email.as_deref())
        .bind(event.backend.as_deref())
        .bind(&metadata_json)
        .bind(event.client_ip.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to write authentication audit event".to_string(),
        })?;

        Ok(())
    }

    /// Most recent audit entries, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT id, action, identity_id, email, backend, metadata, client_ip, user_agent, created_at \
             FROM audit_log ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to list audit events".to_string(),
        })?;

        Ok(rows)
    }

    /// Audit entries for one identity, newest first.
    pub async fn list_for_identity(
        &self,
        identity_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT id, action, identity_id, email, backend, metadata, client_ip, user_agent, created_at \
             FROM audit_log WHERE identity_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(identity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| AssayGateError::Database {
            source: err,
            context: "Failed to list audit events for identity".to_string(),
        })?;

        Ok(rows)
    }
}
