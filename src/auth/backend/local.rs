//! Local authentication backend backed by the credential store.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::backend::{
    AuthBackend, ChallengeKind, LoginOutcome, MfaSetup, RegistrationOutcome, SessionTokens,
};
use crate::auth::hashing;
use crate::auth::identity::{Identity, NewIdentity, RegisterRequest};
use crate::auth::tokens::{TokenCodec, TokenKind};
use crate::auth::validation::enforce_password_policy;
use crate::config::PasswordPolicyConfig;
use crate::domain::IdentityId;
use crate::errors::{AssayGateError, Result};
use crate::observability::metrics;
use crate::storage::repositories::{AuditEvent, AuditLogRepository, IdentityRepository};

/// Pre-computed dummy hash for timing-safe user enumeration prevention.
/// When a non-existent email is used, we still run Argon2 verification
/// against this hash so the response time matches real verification.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hashing::hash_password("dummy_startup_value")
        .unwrap_or_else(|_| "$argon2id$v=19$m=768,t=1,p=1$dW5rbm93bg$dW5rbm93bg".to_string())
});

const BACKEND_NAME: &str = "local";

/// Backend that verifies Argon2 hashes held in the credential store and
/// mints both halves of the session token pair itself.
#[derive(Clone)]
pub struct LocalBackend {
    identities: Arc<dyn IdentityRepository>,
    audit: Arc<AuditLogRepository>,
    codec: TokenCodec,
    password_policy: PasswordPolicyConfig,
}

impl LocalBackend {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        audit: Arc<AuditLogRepository>,
        codec: TokenCodec,
        password_policy: PasswordPolicyConfig,
    ) -> Self {
        Self { identities, audit, codec, password_policy }
    }

    /// Reject credentials without revealing whether the email exists.
    async fn reject_credentials(&self, email: &str, reason: &str) -> AssayGateError {
        warn!(email = %email, reason = %reason, "local authentication rejected");
        metrics::record_auth_attempt(BACKEND_NAME, "invalid_credentials").await;
        AssayGateError::invalid_credentials()
    }

    fn session_tokens(&self, identity: Identity) -> Result<SessionTokens> {
        let pair = self.codec.issue_pair(&identity)?;
        Ok(SessionTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            identity: identity.into(),
        })
    }
}

#[async_trait]
impl AuthBackend for LocalBackend {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = Identity::normalize_email(email);

        let identity = match self.identities.find_by_email(&email).await? {
            Some(identity) => identity,
            None => {
                // Burn the same Argon2 work as a real verification so the
                // response time does not leak which emails exist.
                if let Err(e) = hashing::verify_password(password, &DUMMY_HASH) {
                    warn!(error = %e, "dummy hash verification failed unexpectedly");
                }
                return Err(self.reject_credentials(&email, "unknown_email").await);
            }
        };

        // Provider-mirrored rows have no local hash; they cannot log in here.
        let password_hash = match identity.password_hash.as_deref() {
            Some(hash) => hash,
            None => {
                if let Err(e) = hashing::verify_password(password, &DUMMY_HASH) {
                    warn!(error = %e, "dummy hash verification failed unexpectedly");
                }
                return Err(self.reject_credentials(&email, "no_local_credential").await);
            }
        };

        let password_matches = hashing::verify_password(password, password_hash)?;
        if !password_matches {
            metrics::record_auth_attempt(BACKEND_NAME, "invalid_credentials").await;
            self.audit
                .record_auth_event(
                    AuditEvent::auth(
                        "auth.login.failed",
                        Some(identity.id.as_str()),
                        Some(&identity.email),
                        serde_json::json!({ "reason": "invalid_password" }),
                    )
                    .with_backend(BACKEND_NAME),
                )
                .await?;
            warn!(identity_id = %identity.id, "login attempt with incorrect password");
            return Err(AssayGateError::invalid_credentials());
        }

        // Credentials are checked before the active flag so a disabled
        // account with a wrong password still reads as invalid credentials.
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
            warn!(identity_id = %identity.id, "login attempt for disabled account");
            return Err(AssayGateError::account_disabled());
        }

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
        metrics::record_token_issued(TokenKind::Access.as_str()).await;
        metrics::record_token_issued(TokenKind::Refresh.as_str()).await;
        info!(identity_id = %identity.id, "identity logged in");

        Ok(LoginOutcome::Session(self.session_tokens(identity)?))
    }

    async fn respond_to_challenge(
        &self,
        _email: &str,
        _challenge: ChallengeKind,
        _session: &str,
        _responses: &HashMap<String, String>,
    ) -> Result<LoginOutcome> {
        Err(AssayGateError::unsupported("respond_to_challenge", BACKEND_NAME))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome> {
        request.validate()?;
        enforce_password_policy(&request.password, &self.password_policy)?;

        let password_hash = hashing::hash_password(&request.password)?;
        let identity = self
            .identities
            .create_identity(NewIdentity {
                id: IdentityId::new(),
                email: request.email.clone(),
                display_name: request.display_name.clone(),
                password_hash: Some(password_hash),
                role: request.role,
                active: true,
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
                    serde_json::json!({ "role": identity.role.as_str() }),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_registration(BACKEND_NAME).await;
        info!(identity_id = %identity.id, role = %identity.role, "identity registered");

        Ok(RegistrationOutcome { identity: identity.into(), requires_confirmation: false })
    }

    async fn confirm_registration(&self, _email: &str, _code: &str) -> Result<()> {
        Err(AssayGateError::unsupported("confirm_registration", BACKEND_NAME))
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        let claims = self.codec.validate_refresh_token(refresh_token)?;

        let identity = match self.identities.find_by_id(&claims.sub).await? {
            Some(identity) => identity,
            None => {
                metrics::record_validation_failure("unknown_subject").await;
                warn!(identity_id = %claims.sub, "refresh for deleted identity");
                return Err(AssayGateError::invalid_token());
            }
        };

        if claims.ver != identity.token_version {
            metrics::record_validation_failure("stale_version").await;
            warn!(identity_id = %identity.id, "refresh with revoked token version");
            return Err(AssayGateError::invalid_token());
        }

        if !identity.active {
            metrics::record_validation_failure("inactive").await;
            return Err(AssayGateError::account_disabled());
        }

        let access_token = self.codec.issue(&identity, TokenKind::Access)?;
        metrics::record_token_issued(TokenKind::Access.as_str()).await;

        // The refresh credential is echoed back unchanged; rotation is not
        // part of the baseline design.
        Ok(SessionTokens {
            access_token,
            refresh_token: refresh_token.to_string(),
            identity: identity.into(),
        })
    }

    #[instrument(
        skip(self, _session_token, current_password, new_password),
        fields(identity_id = %identity_id)
    )]
    async fn change_password(
        &self,
        identity_id: &IdentityId,
        _session_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let identity = self
            .identities
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| AssayGateError::not_found("identity", identity_id.as_str()))?;

        let password_hash = identity
            .password_hash
            .as_deref()
            .ok_or_else(AssayGateError::invalid_credentials)?;

        if !hashing::verify_password(current_password, password_hash)? {
            warn!(identity_id = %identity.id, "password change with wrong current password");
            self.audit
                .record_auth_event(
                    AuditEvent::auth(
                        "auth.password.change_failed",
                        Some(identity.id.as_str()),
                        Some(&identity.email),
                        serde_json::json!({ "reason": "invalid_current_password" }),
                    )
                    .with_backend(BACKEND_NAME),
                )
                .await?;
            return Err(AssayGateError::invalid_credentials());
        }

        enforce_password_policy(new_password, &self.password_policy)?;

        let new_hash = hashing::hash_password(new_password)?;
        // update_password bumps token_version, revoking every outstanding
        // access and refresh token for this identity.
        self.identities.update_password(&identity.id, new_hash).await?;

        self.audit
            .record_auth_event(
                AuditEvent::auth(
                    "auth.password.changed",
                    Some(identity.id.as_str()),
                    Some(&identity.email),
                    serde_json::json!({}),
                )
                .with_backend(BACKEND_NAME),
            )
            .await?;

        metrics::record_password_change(BACKEND_NAME).await;
        info!(identity_id = %identity.id, "password changed");
        Ok(())
    }

    async fn forgot_password(&self, _email: &str) -> Result<()> {
        Err(AssayGateError::unsupported("forgot_password", BACKEND_NAME))
    }

    async fn reset_password(&self, _email: &str, _code: &str, _new_password: &str) -> Result<()> {
        Err(AssayGateError::unsupported("reset_password", BACKEND_NAME))
    }

    async fn setup_mfa(
        &self,
        _identity_id: &IdentityId,
        _session_token: &str,
    ) -> Result<MfaSetup> {
        Err(AssayGateError::unsupported("setup_mfa", BACKEND_NAME))
    }

    async fn verify_mfa_setup(
        &self,
        _identity_id: &IdentityId,
        _session_token: &str,
        _code: &str,
    ) -> Result<()> {
        Err(AssayGateError::unsupported("verify_mfa_setup", BACKEND_NAME))
    }

    #[instrument(skip(self, _session_token), fields(identity_id = %identity_id))]
    async fn sign_out_everywhere(
        &self,
        identity_id: &IdentityId,
        _session_token: &str,
    ) -> Result<()> {
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
        info!(identity_id = %identity_id, "all sessions revoked");
        Ok(())
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }
}
