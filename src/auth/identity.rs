//! Identity model for the credential store.
//!
//! An [`Identity`] is the single account record both auth backends resolve
//! against: locally registered accounts carry an Argon2 hash, while
//! provider-managed accounts mirror the provider's subject (no local hash)
//! so request authentication works identically for both. Emails are unique
//! case-insensitively; [`Identity::normalize_email`] is applied at every
//! boundary before storage or lookup.
//!
//! `token_version` is the revocation counter embedded in issued tokens:
//! bumping it (password change, deactivation, global sign-out) invalidates
//! every previously issued token at its next validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::roles::Role;
use crate::domain::{IdentityId, OrgId};

/// An account record, owned exclusively by the credential store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: IdentityId,
    /// Normalized (trimmed, lowercased) unique email
    pub email: String,
    pub display_name: String,
    /// Argon2 PHC string; `None` for provider-managed identities
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    /// Disabled identities fail every authentication path
    pub active: bool,
    /// Elevated flag, distinct from role; does not widen permissions
    pub superuser: bool,
    pub org_id: Option<OrgId>,
    /// Revocation counter embedded in issued tokens
    pub token_version: i64,
    /// TOTP secret recorded at MFA setup, confirmed by verification
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Normalize an email for storage and lookups: trim then lowercase.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Data for inserting a new identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub id: IdentityId,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub active: bool,
    pub superuser: bool,
    pub org_id: Option<OrgId>,
}

/// Partial identity update; `None` fields are left unchanged.
/// Nullable columns use a nested `Option` so they can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct UpdateIdentity {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub superuser: Option<bool>,
    pub org_id: Option<Option<OrgId>>,
    pub mfa_secret: Option<Option<String>>,
    pub mfa_enabled: Option<bool>,
}

impl UpdateIdentity {
    /// Update that clears MFA enrollment entirely
    pub fn disable_mfa() -> Self {
        Self { mfa_secret: Some(None), mfa_enabled: Some(false), ..Default::default() }
    }
}

/// Public view of an identity: no credential material, ever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IdentityResponse {
    pub id: IdentityId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    pub superuser: bool,
    pub org_id: Option<OrgId>,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            display_name: identity.display_name,
            role: identity.role,
            active: identity.active,
            superuser: identity.superuser,
            org_id: identity.org_id,
            mfa_enabled: identity.mfa_enabled,
            last_login_at: identity.last_login_at,
            created_at: identity.created_at,
        }
    }
}

/// Login request payload
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

/// Registration request payload. The password is additionally checked
/// against the platform password policy by the backend.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "crate::auth::validation::validate_display_name"))]
    pub display_name: String,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
    /// Role requested at sign-up; administrator roles are rejected
    #[validate(custom(function = "crate::auth::validation::validate_registerable_role"))]
    pub role: Role,
    pub org_id: Option<OrgId>,
}

/// Registration confirmation payload (managed backend)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ConfirmRegistrationRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "crate::auth::validation::validate_numeric_code"))]
    pub code: String,
}

/// Password change payload for an authenticated identity
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password cannot be empty"))]
    pub current_password: String,
    #[validate(length(min = 1, message = "New password cannot be empty"))]
    pub new_password: String,
}

/// Password reset initiation payload
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Password reset completion payload (managed backend)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "crate::auth::validation::validate_numeric_code"))]
    pub code: String,
    #[validate(length(min = 1, message = "New password cannot be empty"))]
    pub new_password: String,
}

/// TOTP verification payload (managed backend MFA enrollment)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MfaVerifyRequest {
    #[validate(custom(function = "crate::auth::validation::validate_numeric_code"))]
    pub code: String,
}
