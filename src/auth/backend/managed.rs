//! Managed authentication backend delegating to an external identity provider.
//!
//! The provider owns credentials, confirmation codes, MFA enrollment, and
//! session revocation; this backend keeps a mirrored identity row in the
//! credential store for authorization decisions and mints the session's
//! access token locally so request authentication never leaves the process.
//! Provider tokens are never persisted: the session's refresh credential is
//! the provider's opaque refresh token, and token-bound provider calls
//! re-exchange it on demand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::backend::{
    AuthBackend, AuthChallenge, ChallengeKind, LoginOutcome, MfaSetup, RegistrationOutcome,
    SessionTokens,
};
use crate::auth::identity::{Identity, NewIdentity, RegisterRequest, UpdateIdentity};
use crate::auth::roles::Role;
use crate::auth::tokens::{TokenCodec, TokenKind};
use crate::auth::validation::enforce_password_policy;
use crate::config::PasswordPolicyConfig;
use crate::domain::IdentityId;
use crate::errors::{AssayGateError, AuthFailureKind, Result};
use crate::observability::metrics;
use crate::provider::{ProviderClient, ProviderError, ProviderTokens, ProviderUser};
use crate::storage::repositories::{AuditEvent, AuditLogRepository, IdentityRepository};

const BACKEND_NAME: &str = "managed";

/// Attribute under which the provider stores the platform role.
const ROLE_ATTRIBUTE: &str = "custom:role";

/// Backend that fronts an external identity provider.
#[derive(Clone)]
pub struct ManagedBackend {
    provider: Arc<dyn ProviderClient>,
    identities: Arc<dyn IdentityRepository>,
    audit: Arc<AuditLogRepository>,
    codec: TokenCodec,
    password_policy: PasswordPolicyConfig,
    issuer: String,
}

/// Remap a provider fault into the crate's error taxonomy. Every provider
/// error crosses this single boundary; the original code and message are
/// logged here and never surfaced verbatim to callers.
fn remap_provider_error(operation: &'static str, error: ProviderError) -> AssayGateError {
    match &error {
        ProviderError::Api { code: Some(code), message } => match code.as_str() {
            "NotAuthorizedException"
            | "UserNotFoundException"
            | "UserNotConfirmedException"
            | "CodeMismatchException"
            | "ExpiredCodeException"
            | "PasswordResetRequiredException" => {
                warn!(operation, code = %code, "provider rejected credentials");
                AssayGateError::invalid_credentials()
            }
            "UsernameExistsException" => {
                AssayGateError::conflict("An identity with this email already exists", "identity")
            }
            "InvalidPasswordException" => AssayGateError::weak_password(
                "Password does not meet the identity provider's policy",
            ),
            _ => {
                warn!(operation, code = %code, message = %message, "provider request failed");
                AssayGateError::integration_with_code(operation, code.clone(), message.clone())
            }
        },
        ProviderError::Api { code: None, message } => {
            warn!(operation, message = %message, "provider request failed without error code");
            AssayGateError::integration(operation, message.clone())
        }
        ProviderError::Transport { message } => {
            warn!(operation, message = %message, "provider transport failure");
            AssayGateError::integration(operation, message.clone())
        }
    }
}

impl ManagedBackend {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        identities: Arc<dyn IdentityRepository>,
        audit: Arc<AuditLogRepository>,
        codec: TokenCodec,
        password_policy: PasswordPolicyConfig,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            identities,
            audit,
            codec,
            password_policy,
            issuer: issuer.into(),
        }
    }

    /// Exchange the session's refresh credential for a short-lived provider
    /// access token. Provider rejection means the session was revoked.
    async fn provider_access_token(
        &self,
        operation: &'static str,
        session_token: &str,
    ) -> Result<String> {
        let tokens = self
            .provider
            .refresh_tokens(session_token)
            .await
            .map_err(|e| remap_provider_error(operation, e))?;
        Ok(tokens.access_token)
    }

    /// Create the local mirror row for a provider identity seen for the
    /// first time. The provider subject becomes the identity id so token
    /// subjects resolve through the same store lookups as local accounts.
    async fn provision_mirror(
        &self,
        operation: &'static str,
        provider_user: &ProviderUser,
    ) -> Result<Identity> {
        let role = match provider_user.role_attribute.as_deref() {
            Some(raw) => raw.parse::<Role>().map_err(|_| {
                warn!(
                    operation,
                    subject = %provider_user.subject,
                    role_attribute = %raw,
                    "provider user carries an unknown role attribute"
                );
                AssayGateError::integration(
                    operation,
                    format!("unknown role attribute '{}'", raw),
                )
            })?,
            None => {
                warn!(
                    operation,
                    subject = %provider_user.subject,
                    "provider user is missing the role attribute"
                );
                return Err(AssayGateError::integration(
                    operation,
                    "provider user is missing the role attribute",
                ));
            }
        };

        let identity = self
            .identities
            .create_identity(NewIdentity {
                id: IdentityId::from_string(provider_user.subject.clone()),
                email: provider_user.email.clone(),
                display_name: provider_user.display_name.clone(),
                password_hash: None,
                role,
                active: true,
                superuser: false,
                org_id: None,
            })
            .await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.identity.mirrored",
                    Some(identity.id.as_str()),
                    Some(&identity.email),
                    serde_json::json!({ "role": identity.role.as_str() }),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        info!(identity_id = %identity.id, role = %identity.role, "provider identity mirrored");
        Ok(identity)
    }

    /// Finish a provider login: resolve (or provision) the mirror, stamp
    /// last-login, and assemble the session with a locally minted access
    /// token and the provider's refresh token as the refresh credential.
    async fn complete_session(
        &self,
        operation: &'static str,
        email: &str,
        tokens: ProviderTokens,
    ) -> Result<SessionTokens> {
        let normalized = Identity::normalize_email(email);
        let identity = match self.identities.find_by_email(&normalized).await? {
            Some(identity) => identity,
            None => {
                let provider_user = self
                    .provider
                    .get_user(&tokens.access_token)
                    .await
                    .map_err(|e| remap_provider_error(operation, e))?;
                self.provision_mirror(operation, &provider_user).await?
            }
        };

        if !identity.active {
            metrics::record_auth_attempt(BACKEND_NAME, "account_disabled").await;
            self.audit
                .record_auth_event(
                    AuditEvent::auth(
                        "auth.login.failed",
                        Some(identity.id.as_str()),
                        Some(&identity.email),
                        serde_json::json!({ "reason": "account_disabled" }),
                    )
                    .with_backend(BACKEND_NAME),
                )
                .await?;
            warn!(identity_id = %identity.id, "provider login for disabled mirror");
            return Err(AssayGateError::account_disabled());
        }

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AssayGateError::integration(operation, "provider response is missing a refresh token")
        })?;

        self.identities.record_login(&identity.id).await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.login.success",
                    Some(identity.id.as_str()),
                    Some(&identity.email),
                    serde_json::json!({ "role": identity.role.as_str() }),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_auth_attempt(BACKEND_NAME, "success").await;
        let access_token = self.codec.issue(&identity, TokenKind::Access)?;
        metrics::record_token_issued(TokenKind::Access.as_str()).await;
        info!(identity_id = %identity.id, "identity logged in via provider");

        Ok(SessionTokens { access_token, refresh_token, identity: identity.into() })
    }

    /// Map a provider auth-flow response into a login outcome.
    async fn map_flow_outcome(
        &self,
        operation: &'static str,
        email: &str,
        response: crate::provider::AuthFlowResponse,
    ) -> Result<LoginOutcome> {
        if let Some(challenge) = response.challenge {
            let kind = ChallengeKind::from_wire(&challenge.name).ok_or_else(|| {
                AssayGateError::integration(
                    operation,
                    format!("unsupported challenge '{}'", challenge.name),
                )
            })?;
            metrics::record_auth_attempt(BACKEND_NAME, "challenge").await;
            info!(challenge = %kind, "provider requires an additional challenge");
            return Ok(LoginOutcome::Challenge(AuthChallenge {
                kind,
                session: challenge.session,
                parameters: challenge.parameters,
            }));
        }

        let tokens = response.tokens.ok_or_else(|| {
            AssayGateError::integration(
                operation,
                "provider returned neither tokens nor a challenge",
            )
        })?;

        Ok(LoginOutcome::Session(self.complete_session(operation, email, tokens).await?))
    }

    /// Count a failed provider auth attempt under the right status label.
    async fn record_failed_attempt(&self, error: &AssayGateError) {
        let status = match error.auth_kind() {
            Some(AuthFailureKind::InvalidCredentials) => "invalid_credentials",
            Some(AuthFailureKind::AccountDisabled) => "account_disabled",
            _ => "error",
        };
        metrics::record_auth_attempt(BACKEND_NAME, status).await;
    }
}

#[async_trait]
impl AuthBackend for ManagedBackend {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let response = match self.provider.initiate_auth(email, password).await {
            Ok(response) => response,
            Err(error) => {
                let remapped = remap_provider_error("authenticate", error);
                self.record_failed_attempt(&remapped).await;
                return Err(remapped);
            }
        };

        self.map_flow_outcome("authenticate", email, response).await
    }

    #[instrument(skip(self, session, responses), fields(email = %email, challenge = %challenge))]
    async fn respond_to_challenge(
        &self,
        email: &str,
        challenge: ChallengeKind,
        session: &str,
        responses: &HashMap<String, String>,
    ) -> Result<LoginOutcome> {
        let response = match self
            .provider
            .respond_to_challenge(email, challenge.as_wire(), session, responses)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                let remapped = remap_provider_error("respond_to_challenge", error);
                self.record_failed_attempt(&remapped).await;
                return Err(remapped);
            }
        };

        self.map_flow_outcome("respond_to_challenge", email, response).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome> {
        request.validate()?;
        enforce_password_policy(&request.password, &self.password_policy)?;

        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), request.display_name.clone());
        attributes.insert(ROLE_ATTRIBUTE.to_string(), request.role.as_str().to_string());

        let response = self
            .provider
            .sign_up(&request.email, &request.password, &attributes)
            .await
            .map_err(|e| remap_provider_error("register", e))?;

        // Mirror the provider identity; it stays inactive until confirmed.
        let identity = self
            .identities
            .create_identity(NewIdentity {
                id: IdentityId::from_string(response.subject.clone()),
                email: request.email.clone(),
                display_name: request.display_name.clone(),
                password_hash: None,
                role: request.role,
                active: !response.requires_confirmation,
                superuser: false,
                org_id: request.org_id.clone(),
            })
            .await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.register",
                    Some(identity.id.as_str()),
                    Some(&identity.email),
                    serde_json::json!({
                        "role": identity.role.as_str(),
                        "requires_confirmation": response.requires_confirmation,
                    }),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_registration(BACKEND_NAME).await;
        info!(identity_id = %identity.id, "identity registered with provider");

        Ok(RegistrationOutcome {
            identity: identity.into(),
            requires_confirmation: response.requires_confirmation,
        })
    }

    #[instrument(skip(self, code), fields(email = %email))]
    async fn confirm_registration(&self, email: &str, code: &str) -> Result<()> {
        self.provider
            .confirm_sign_up(email, code)
            .await
            .map_err(|e| remap_provider_error("confirm_registration", e))?;

        let normalized = Identity::normalize_email(email);
        match self.identities.find_by_email(&normalized).await? {
            Some(identity) => {
                self.identities
                    .update_identity(
                        &identity.id,
                        UpdateIdentity { active: Some(true), ..Default::default() },
                    )
                    .await?;
                self.audit
                    .record_auth_event(
                        AuditEvent::auth(
                            "auth.register.confirmed",
                            Some(identity.id.as_str()),
                            Some(&identity.email),
                            serde_json::json!({}),
                        )
                        .with_backend(BACKEND_NAME),
                    )
                    .await?;
                info!(identity_id = %identity.id, "registration confirmed");
            }
            None => {
                // The mirror will be provisioned at first login.
                warn!(email = %normalized, "confirmed registration has no local mirror");
            }
        }

        Ok(())
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        let tokens = self
            .provider
            .refresh_tokens(refresh_token)
            .await
            .map_err(|e| remap_provider_error("refresh", e))?;

        // Re-resolve the mirror so role or active-flag changes since the
        // last refresh take effect on the new access token.
        let provider_user = self
            .provider
            .get_user(&tokens.access_token)
            .await
            .map_err(|e| remap_provider_error("refresh", e))?;

        let normalized = Identity::normalize_email(&provider_user.email);
        let identity = match self.identities.find_by_email(&normalized).await? {
            Some(identity) => identity,
            None => {
                metrics::record_validation_failure("unknown_subject").await;
                warn!(email = %normalized, "refresh for identity without a local mirror");
                return Err(AssayGateError::invalid_token());
            }
        };

        if !identity.active {
            metrics::record_validation_failure("inactive").await;
            return Err(AssayGateError::account_disabled());
        }

        let access_token = self.codec.issue(&identity, TokenKind::Access)?;
        metrics::record_token_issued(TokenKind::Access.as_str()).await;

        // The provider refresh flow does not rotate the refresh token.
        Ok(SessionTokens {
            access_token,
            refresh_token: refresh_token.to_string(),
            identity: identity.into(),
        })
    }

    #[instrument(
        skip(self, session_token, current_password, new_password),
        fields(identity_id = %identity_id)
    )]
    async fn change_password(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        enforce_password_policy(new_password, &self.password_policy)?;

        let provider_access =
            self.provider_access_token("change_password", session_token).await?;
        self.provider
            .change_password(&provider_access, current_password, new_password)
            .await
            .map_err(|e| remap_provider_error("change_password", e))?;

        // Locally minted access tokens die with the old password.
        self.identities.bump_token_version(identity_id).await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.password.changed",
                    Some(identity_id.as_str()),
                    None,
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_password_change(BACKEND_NAME).await;
        info!(identity_id = %identity_id, "password changed via provider");
        Ok(())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn forgot_password(&self, email: &str) -> Result<()> {
        match self.provider.forgot_password(email).await {
            Ok(()) => {}
            Err(error) => {
                let remapped = remap_provider_error("forgot_password", error);
                // Enumeration prevention: credential-shaped rejections (the
                // provider's user-not-found among them) read as success.
                if remapped.auth_kind().is_none() {
                    return Err(remapped);
                }
            }
        }

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.password.reset_requested",
                    None,
                    Some(email),
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        Ok(())
    }

    #[instrument(skip(self, code, new_password), fields(email = %email))]
    async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        enforce_password_policy(new_password, &self.password_policy)?;

        self.provider
            .confirm_forgot_password(email, code, new_password)
            .await
            .map_err(|e| remap_provider_error("reset_password", e))?;

        // Outstanding locally minted tokens die with the old password.
        let normalized = Identity::normalize_email(email);
        if let Some(identity) = self.identities.find_by_email(&normalized).await? {
            self.identities.bump_token_version(&identity.id).await?;
        }

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.password.reset",
                    None,
                    Some(&normalized),
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_password_change(BACKEND_NAME).await;
        Ok(())
    }

    #[instrument(skip(self, session_token), fields(identity_id = %identity_id))]
    async fn setup_mfa(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<MfaSetup> {
        let identity = self
            .identities
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("identity", identity_id.as_str()))?;

        let provider_access = self.provider_access_token("setup_mfa", session_token).await?;
        let secret = self
            .provider
            .associate_software_token(&provider_access)
            .await
            .map_err(|e| remap_provider_error("setup_mfa", e))?;

        // Record the pending secret; it is not trusted until verified.
        self.identities
            .update_identity(
                &identity.id,
                UpdateIdentity { mfa_secret: Some(Some(secret.clone())), ..Default::default() },
            )
            .await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.mfa.setup_started",
                    Some(identity.id.as_str()),
                    Some(&identity.email),
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        let otpauth_uri = format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}",
            self.issuer, identity.email, secret, self.issuer
        );

        Ok(MfaSetup { secret, otpauth_uri })
    }

    #[instrument(skip(self, session_token, code), fields(identity_id = %identity_id))]
    async fn verify_mfa_setup(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        code: &str,
    ) -> Result<()> {
        let provider_access =
            self.provider_access_token("verify_mfa_setup", session_token).await?;
        self.provider
            .verify_software_token(&provider_access, code)
            .await
            .map_err(|e| remap_provider_error("verify_mfa_setup", e))?;

        self.identities
            .update_identity(
                identity_id,
                UpdateIdentity { mfa_enabled: Some(true), ..Default::default() },
            )
            .await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.mfa.enabled",
                    Some(identity_id.as_str()),
                    None,
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        info!(identity_id = %identity_id, "MFA enabled");
        Ok(())
    }

    #[instrument(skip(self, session_token), fields(identity_id = %identity_id))]
    async fn sign_out_everywhere(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<()> {
        let provider_access =
            self.provider_access_token("sign_out_everywhere", session_token).await?;
        self.provider
            .global_sign_out(&provider_access)
            .await
            .map_err(|e| remap_provider_error("sign_out_everywhere", e))?;

        // Provider sessions are gone; bump the mirror version so locally
        // minted access tokens stop validating too.
        let new_version = self.identities.bump_token_version(identity_id).await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.signout.global",
                    Some(identity_id.as_str()),
                    None,
                    serde_json::json!({ "token_version": new_version }),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_session_revocation(BACKEND_NAME).await;
        info!(identity_id = %identity_id, "all provider sessions revoked");
        Ok(())
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }
}
