//! Authentication backend strategy.
//!
//! Two interchangeable backends implement the same operation surface:
//! [`LocalBackend`] verifies Argon2 hashes held in the credential store,
//! while [`ManagedBackend`] delegates to an external identity provider and
//! keeps a mirrored identity row for authorization decisions. The backend is
//! selected once at startup from [`crate::config::BackendKind`]; callers hold
//! an `Arc<dyn AuthBackend>` and never branch on the concrete type.

mod local;
mod managed;

pub use local::LocalBackend;
pub use managed::ManagedBackend;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::identity::{IdentityResponse, RegisterRequest};
use crate::domain::IdentityId;
use crate::errors::Result;

/// Access and refresh credentials for an established session.
///
/// The access token is always minted by this crate's codec. The refresh
/// credential differs per backend: a refresh-kind JWT on the local backend,
/// the provider's opaque refresh token on the managed one. Either way the
/// pair is opaque to callers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: IdentityResponse,
}

/// Extra step demanded by the identity provider before a login completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeKind {
    NewPasswordRequired,
    MfaSetup,
    SoftwareTokenMfa,
}

impl ChallengeKind {
    /// Provider wire name for this challenge.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ChallengeKind::NewPasswordRequired => "NEW_PASSWORD_REQUIRED",
            ChallengeKind::MfaSetup => "MFA_SETUP",
            ChallengeKind::SoftwareTokenMfa => "SOFTWARE_TOKEN_MFA",
        }
    }

    /// Parse a provider wire name; unknown challenges return `None` and are
    /// surfaced as integration faults by the managed backend.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "NEW_PASSWORD_REQUIRED" => Some(ChallengeKind::NewPasswordRequired),
            "MFA_SETUP" => Some(ChallengeKind::MfaSetup),
            "SOFTWARE_TOKEN_MFA" => Some(ChallengeKind::SoftwareTokenMfa),
            _ => None,
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// Pending challenge handed back to the caller; the `session` string must be
/// echoed to `respond_to_challenge` together with the challenge responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthChallenge {
    pub kind: ChallengeKind,
    pub session: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Result of an authentication attempt: either a complete session or a
/// challenge the caller must answer first. Callers must branch on the
/// variant before treating the outcome as "logged in".
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginOutcome {
    Session(SessionTokens),
    Challenge(AuthChallenge),
}

impl LoginOutcome {
    pub fn is_session(&self) -> bool {
        matches!(self, LoginOutcome::Session(_))
    }

    pub fn is_challenge(&self) -> bool {
        matches!(self, LoginOutcome::Challenge(_))
    }
}

/// Result of a registration. No tokens are issued on either backend; the
/// caller authenticates explicitly once `requires_confirmation` is cleared.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationOutcome {
    pub identity: IdentityResponse,
    pub requires_confirmation: bool,
}

/// TOTP enrollment material produced by `setup_mfa`. The `otpauth_uri` is
/// ready for client-side QR rendering.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MfaSetup {
    pub secret: String,
    pub otpauth_uri: String,
}

/// Uniform authentication surface over the local credential store or a
/// managed identity provider.
///
/// `session_token` parameters carry the session's refresh credential: the
/// local backend ignores it (the authenticated `identity_id` is
/// authoritative), while the managed backend exchanges it with the provider
/// for a short-lived provider access token before invoking token-bound
/// provider operations. No provider token is ever stored in-process or in
/// the credential store.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Verify credentials, returning a session or a pending challenge.
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginOutcome>;

    /// Answer a pending challenge; may complete the login or chain to a
    /// further challenge.
    async fn respond_to_challenge(
        &self,
        email: &str,
        challenge: ChallengeKind,
        session: &str,
        responses: &HashMap<String, String>,
    ) -> Result<LoginOutcome>;

    /// Create a new identity. Duplicate emails fail with `Conflict`.
    async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome>;

    /// Confirm a registration with the emailed verification code.
    async fn confirm_registration(&self, email: &str, code: &str) -> Result<()>;

    /// Exchange a refresh credential for a fresh access token. The same
    /// refresh credential is echoed back (no rotation).
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens>;

    /// Change the password of an authenticated identity. Revokes every
    /// previously issued token.
    async fn change_password(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Start a password reset. Backends with a reset channel report generic
    /// success for any email so callers cannot probe which accounts exist.
    async fn forgot_password(&self, email: &str) -> Result<()>;

    /// Complete a password reset with the emailed code.
    async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()>;

    /// Begin TOTP enrollment, producing a shared secret and provisioning URI.
    async fn setup_mfa(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<MfaSetup>;

    /// Confirm TOTP enrollment with a code from the authenticator app.
    async fn verify_mfa_setup(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        code: &str,
    ) -> Result<()>;

    /// Revoke every outstanding session for the identity.
    async fn sign_out_everywhere(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<()>;

    /// Stable backend label used in logs, metrics, and audit rows.
    fn name(&self) -> &'static str;
}
