//! Identity administration service.
//!
//! Business logic for the identity lifecycle outside the authentication
//! flows: admin-provisioned accounts, profile and role updates, activation
//! toggles, and removal. Every mutation is audited with the acting
//! administrator. Authorization (who may call these) is enforced by the
//! caller through the permission matrix; this service assumes it.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::hashing;
use crate::auth::identity::{Identity, NewIdentity, UpdateIdentity};
use crate::auth::roles::Role;
use crate::auth::validation::{enforce_password_policy, validate_display_name};
use crate::config::PasswordPolicyConfig;
use crate::domain::{IdentityId, OrgId};
use crate::errors::{AssayGateError, Result};
use crate::storage::repositories::{AuditEvent, AuditLogRepository, IdentityRepository};

/// Service for managing identities (admin-only operations).
#[derive(Clone)]
pub struct IdentityService {
    identities: Arc<dyn IdentityRepository>,
    audit: Arc<AuditLogRepository>,
    password_policy: PasswordPolicyConfig,
}

impl IdentityService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        audit: Arc<AuditLogRepository>,
        password_policy: PasswordPolicyConfig,
    ) -> Self {
        Self { identities, audit, password_policy }
    }

    /// Provision an identity with local credentials.
    ///
    /// Unlike self-registration, the admin surface may assign any role,
    /// including administrator roles.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, password), fields(email = %email, role = %role))]
    pub async fn create_identity(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
        superuser: bool,
        org_id: Option<OrgId>,
        created_by: Option<String>,
    ) -> Result<Identity> {
        let email = Identity::normalize_email(email);
        validate_display_name(display_name).map_err(|_| {
            AssayGateError::validation_field(
                "Display name must be non-empty and at most 128 characters",
                "display_name",
            )
        })?;
        enforce_password_policy(password, &self.password_policy)?;

        if self.identities.find_by_email(&email).await?.is_some() {
            return Err(AssayGateError::conflict(
                format!("An identity with email '{}' already exists", email),
                "identity",
            ));
        }

        let password_hash = hashing::hash_password(password)?;
        let identity = self
            .identities
            .create_identity(NewIdentity {
                id: IdentityId::new(),
                email: email.clone(),
                display_name: display_name.to_string(),
                password_hash: Some(password_hash),
                role,
                active: true,
                superuser,
                org_id,
            })
            .await?;

        self.audit
            .record_auth_event(AuditEvent::auth(
                "identity.created",
                Some(identity.id.as_str()),
                Some(&email),
                serde_json::json!({
                    "role": role.as_str(),
                    "superuser": superuser,
                    "created_by": created_by,
                }),
            ))
            .await?;

        info!(identity_id = %identity.id, role = %role, "identity provisioned");
        Ok(identity)
    }

    pub async fn get_identity(&self, id: &IdentityId) -> Result<Option<Identity>> {
        self.identities.find_by_id(id).await
    }

    pub async fn get_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let normalized = Identity::normalize_email(email);
        self.identities.find_by_email(&normalized).await
    }

    pub async fn list_identities(&self, limit: i64, offset: i64) -> Result<Vec<Identity>> {
        self.identities.list_identities(limit, offset).await
    }

    pub async fn count_identities(&self) -> Result<i64> {
        self.identities.count_identities().await
    }

    /// Update an identity's profile, role, activation flag, or MFA state.
    ///
    /// Only fields present in the update payload are modified. Use
    /// [`deactivate`](Self::deactivate) instead of `active: Some(false)`
    /// when outstanding sessions must die with the account.
    #[instrument(skip(self, update), fields(identity_id = %id))]
    pub async fn update_identity(
        &self,
        id: &IdentityId,
        update: UpdateIdentity,
        updated_by: Option<String>,
    ) -> Result<Identity> {
        self.identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("identity", id.as_str()))?;

        let updated = self.identities.update_identity(id, update.clone()).await?;

        self.audit
            .record_auth_event(AuditEvent::auth(
                "identity.updated",
                Some(id.as_str()),
                Some(&updated.email),
                serde_json::json!({
                    "changes": {
                        "display_name": update.display_name,
                        "role": update.role.map(|r| r.as_str()),
                        "active": update.active,
                        "superuser": update.superuser,
                        "mfa_enabled": update.mfa_enabled,
                    },
                    "updated_by": updated_by,
                }),
            ))
            .await?;

        Ok(updated)
    }

    /// Disable an identity and revoke its outstanding sessions.
    ///
    /// Bumps the token version alongside the activation toggle so tokens
    /// issued before deactivation stay dead even if the account is later
    /// re-enabled.
    #[instrument(skip(self), fields(identity_id = %id))]
    pub async fn deactivate(&self, id: &IdentityId, deactivated_by: Option<String>) -> Result<Identity> {
        let identity = self
            .identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("identity", id.as_str()))?;

        let updated = self
            .identities
            .update_identity(id, UpdateIdentity { active: Some(false), ..Default::default() })
            .await?;
        let new_version = self.identities.bump_token_version(id).await?;

        self.audit
            .record_auth_event(AuditEvent::auth(
                "identity.deactivated",
                Some(id.as_str()),
                Some(&identity.email),
                serde_json::json!({
                    "token_version": new_version,
                    "deactivated_by": deactivated_by,
                }),
            ))
            .await?;

        info!(identity_id = %id, "identity deactivated and sessions revoked");
        Ok(updated)
    }

    /// Delete an identity outright. Prefer [`deactivate`](Self::deactivate)
    /// for accounts with history worth keeping.
    #[instrument(skip(self), fields(identity_id = %id))]
    pub async fn delete_identity(&self, id: &IdentityId, deleted_by: Option<String>) -> Result<()> {
        let identity = self
            .identities
            .find_by_id(id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("identity", id.as_str()))?;

        self.identities.delete_identity(id).await?;

        self.audit
            .record_auth_event(AuditEvent::auth(
                "identity.deleted",
                Some(id.as_str()),
                Some(&identity.email),
                serde_json::json!({
                    "display_name": identity.display_name,
                    "deleted_by": deleted_by,
                }),
            ))
            .await?;

        Ok(())
    }
}
