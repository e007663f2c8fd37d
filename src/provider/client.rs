//! Core provider client trait and response types.
//!
//! The trait mirrors the managed identity provider's operation set one to
//! one. Implementations are constructor-injected wherever they are used,
//! never reached through a global, so tests can substitute a stub and the
//! managed backend stays transport-agnostic.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::Result;

/// Outcome of a provider sign-up call.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpResponse {
    /// Provider-assigned subject identifier for the new account
    pub subject: String,
    /// Whether the account must confirm via emailed code before signing in
    pub requires_confirmation: bool,
}

/// Tokens minted by the provider after a successful auth flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    /// Absent on refresh responses; the original refresh token stays valid
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// An interim challenge blocking the auth flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderChallenge {
    /// Provider wire name, e.g. `SOFTWARE_TOKEN_MFA`
    pub name: String,
    /// Opaque session handle to pass back with the challenge response
    pub session: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Response to `initiate_auth` / `respond_to_challenge`: exactly one of
/// `tokens` or `challenge` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFlowResponse {
    pub tokens: Option<ProviderTokens>,
    pub challenge: Option<ProviderChallenge>,
}

/// Provider-side view of an account, used for mirror provisioning.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub subject: String,
    pub email: String,
    pub display_name: String,
    /// Platform role carried as a custom provider attribute
    pub role_attribute: Option<String>,
    pub email_verified: bool,
}

/// Trait for managed identity provider backends.
///
/// Implementations MUST NOT log passwords or tokens, and MUST NOT retry
/// failed calls on their own.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Create an account at the provider.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<SignUpResponse>;

    /// Confirm a pending registration with an emailed code.
    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<()>;

    /// Start a password auth flow. May return tokens or a challenge.
    async fn initiate_auth(&self, email: &str, password: &str) -> Result<AuthFlowResponse>;

    /// Answer an interim challenge. May return tokens or a further challenge.
    async fn respond_to_challenge(
        &self,
        email: &str,
        challenge: &str,
        session: &str,
        responses: &HashMap<String, String>,
    ) -> Result<AuthFlowResponse>;

    /// Exchange a refresh token for fresh provider tokens.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<ProviderTokens>;

    /// Start the password reset flow (provider emails a code).
    async fn forgot_password(&self, email: &str) -> Result<()>;

    /// Complete the password reset flow.
    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Change the password of the authenticated provider session.
    async fn change_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Revoke every session the provider holds for this account.
    async fn global_sign_out(&self, access_token: &str) -> Result<()>;

    /// Begin TOTP enrollment; returns the shared secret.
    async fn associate_software_token(&self, access_token: &str) -> Result<String>;

    /// Confirm TOTP enrollment with a generated code.
    async fn verify_software_token(&self, access_token: &str, code: &str) -> Result<()>;

    /// Fetch the provider's view of the authenticated account.
    async fn get_user(&self, access_token: &str) -> Result<ProviderUser>;
}
