//! Unified authentication surface consumed by HTTP handlers and tooling.
//!
//! The facade owns exactly one [`AuthBackend`] chosen at construction time
//! and mirrors its operation set, enriching session-producing outcomes with
//! the role's [`PermissionMatrix`] so callers never compute authorization
//! data themselves. Provider-only operations invoked against the local
//! backend come back `UnsupportedOperation` from the backend; the facade
//! does not pre-filter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{field, instrument};
use utoipa::ToSchema;

use crate::auth::backend::{
    AuthBackend, AuthChallenge, ChallengeKind, LocalBackend, LoginOutcome, ManagedBackend,
    MfaSetup, RegistrationOutcome, SessionTokens,
};
use crate::auth::identity::{Identity, IdentityResponse, RegisterRequest};
use crate::auth::permissions::PermissionMatrix;
use crate::auth::tokens::TokenCodec;
use crate::config::{AppConfig, BackendKind};
use crate::domain::IdentityId;
use crate::errors::{AssayGateError, Result};
use crate::observability::metrics;
use crate::provider::{HttpProviderClient, ProviderClient};
use crate::storage::repositories::{AuditLogRepository, IdentityRepository, SqlxIdentityRepository};
use crate::storage::DbPool;

/// An authenticated identity together with the capabilities its role grants.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedIdentity {
    pub identity: IdentityResponse,
    pub permissions: PermissionMatrix,
}

impl AuthenticatedIdentity {
    fn from_identity(identity: Identity) -> Self {
        let permissions = PermissionMatrix::for_role(identity.role);
        Self { identity: identity.into(), permissions }
    }
}

/// Session grant handed to clients: the token pair plus the authenticated
/// identity and its permission matrix.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: IdentityResponse,
    pub permissions: PermissionMatrix,
}

impl From<SessionTokens> for SessionResponse {
    fn from(tokens: SessionTokens) -> Self {
        let permissions = PermissionMatrix::for_role(tokens.identity.role);
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            identity: tokens.identity,
            permissions,
        }
    }
}

/// Facade-level login outcome: an enriched session or a pass-through
/// challenge.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginResponse {
    Session(SessionResponse),
    Challenge(AuthChallenge),
}

impl LoginResponse {
    pub fn is_session(&self) -> bool {
        matches!(self, LoginResponse::Session(_))
    }

    pub fn is_challenge(&self) -> bool {
        matches!(self, LoginResponse::Challenge(_))
    }
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Session(tokens) => LoginResponse::Session(tokens.into()),
            LoginOutcome::Challenge(challenge) => LoginResponse::Challenge(challenge),
        }
    }
}

/// Single entry point for every authentication flow.
#[derive(Clone)]
pub struct AuthFacade {
    backend: Arc<dyn AuthBackend>,
    codec: TokenCodec,
    identities: Arc<dyn IdentityRepository>,
    audit: Arc<AuditLogRepository>,
}

impl AuthFacade {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        codec: TokenCodec,
        identities: Arc<dyn IdentityRepository>,
        audit: Arc<AuditLogRepository>,
    ) -> Self {
        Self { backend, codec, identities, audit }
    }

    /// Assemble the facade from configuration: repositories over the shared
    /// pool, the token codec, and the configured backend. A provider client
    /// may be injected (tests); otherwise the managed backend builds the
    /// HTTP client from `config.provider`.
    pub fn from_config(
        config: &AppConfig,
        pool: DbPool,
        provider: Option<Arc<dyn ProviderClient>>,
    ) -> Result<Self> {
        let identities: Arc<dyn IdentityRepository> =
            Arc::new(SqlxIdentityRepository::new(pool.clone()));
        let audit = Arc::new(AuditLogRepository::new(pool));
        let codec = TokenCodec::new(&config.auth);

        let backend: Arc<dyn AuthBackend> = match config.auth.backend {
            BackendKind::Local => Arc::new(LocalBackend::new(
                identities.clone(),
                audit.clone(),
                codec.clone(),
                config.auth.password_policy.clone(),
            )),
            BackendKind::Managed => {
                let provider = match provider {
                    Some(client) => client,
                    None => Arc::new(HttpProviderClient::new(&config.provider)?),
                };
                Arc::new(ManagedBackend::new(
                    provider,
                    identities.clone(),
                    audit.clone(),
                    codec.clone(),
                    config.auth.password_policy.clone(),
                    config.auth.issuer.clone(),
                ))
            }
        };

        Ok(Self::new(backend, codec, identities, audit))
    }

    /// Which backend strategy this facade was built with.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn audit_log(&self) -> Arc<AuditLogRepository> {
        self.audit.clone()
    }

    /// Stamp the current span with a fresh correlation id so one auth
    /// operation's log lines can be tied together across backend and
    /// provider calls.
    fn stamp_correlation_id() {
        tracing::Span::current().record("correlation_id", field::display(uuid::Uuid::new_v4()));
    }

    #[instrument(skip(self, password), fields(correlation_id = field::Empty))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse> {
        Self::stamp_correlation_id();
        Ok(self.backend.authenticate(email, password).await?.into())
    }

    #[instrument(skip(self, session, responses), fields(correlation_id = field::Empty))]
    pub async fn respond_to_challenge(
        &self,
        email: &str,
        challenge: ChallengeKind,
        session: &str,
        responses: &HashMap<String, String>,
    ) -> Result<LoginResponse> {
        Self::stamp_correlation_id();
        Ok(self
            .backend
            .respond_to_challenge(email, challenge, session, responses)
            .await?
            .into())
    }

    #[instrument(skip(self, request), fields(correlation_id = field::Empty))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegistrationOutcome> {
        Self::stamp_correlation_id();
        self.backend.register(request).await
    }

    #[instrument(skip(self, code), fields(correlation_id = field::Empty))]
    pub async fn confirm_registration(&self, email: &str, code: &str) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend.confirm_registration(email, code).await
    }

    #[instrument(skip(self, refresh_token), fields(correlation_id = field::Empty))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        Self::stamp_correlation_id();
        self.backend.refresh(refresh_token).await
    }

    #[instrument(
        skip(self, session_token, current_password, new_password),
        fields(correlation_id = field::Empty)
    )]
    pub async fn change_password(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend
            .change_password(identity_id, session_token, current_password, new_password)
            .await
    }

    #[instrument(skip(self), fields(correlation_id = field::Empty))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend.forgot_password(email).await
    }

    #[instrument(skip(self, code, new_password), fields(correlation_id = field::Empty))]
    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend.reset_password(email, code, new_password).await
    }

    #[instrument(skip(self, session_token), fields(correlation_id = field::Empty))]
    pub async fn setup_mfa(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<MfaSetup> {
        Self::stamp_correlation_id();
        self.backend.setup_mfa(identity_id, session_token).await
    }

    #[instrument(skip(self, session_token, code), fields(correlation_id = field::Empty))]
    pub async fn verify_mfa_setup(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
        code: &str,
    ) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend.verify_mfa_setup(identity_id, session_token, code).await
    }

    #[instrument(skip(self, session_token), fields(correlation_id = field::Empty))]
    pub async fn sign_out_everywhere(
        &self,
        identity_id: &IdentityId,
        session_token: &str,
    ) -> Result<()> {
        Self::stamp_correlation_id();
        self.backend.sign_out_everywhere(identity_id, session_token).await
    }

    /// Resolve an access token to its identity and permissions.
    ///
    /// A structurally valid token over a deleted identity is still a
    /// rejection; a stale `ver` claim means the sessions were revoked since
    /// issuance.
    #[instrument(skip(self, access_token))]
    pub async fn current_user(&self, access_token: &str) -> Result<AuthenticatedIdentity> {
        let claims = self.codec.validate_access_token(access_token)?;

        let identity = match self.identities.find_by_id(&claims.sub).await? {
            Some(identity) => identity,
            None => {
                metrics::record_validation_failure("unknown_subject").await;
                return Err(AssayGateError::invalid_token());
            }
        };

        if claims.ver != identity.token_version {
            metrics::record_validation_failure("stale_version").await;
            return Err(AssayGateError::invalid_token());
        }

        if !identity.active {
            metrics::record_validation_failure("inactive").await;
            return Err(AssayGateError::account_disabled());
        }

        Ok(AuthenticatedIdentity::from_identity(identity))
    }
}
