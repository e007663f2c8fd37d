//! Axum middleware that authenticates API requests.
//!
//! Every request outside the public allow-list must carry a bearer access
//! token. The authenticator validates it, re-checks the identity against the
//! credential store (a signed token over a deleted, revoked, or disabled
//! identity is still a rejection), and attaches a [`RequestPrincipal`] to the
//! request extensions for handlers and permission checks downstream.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{field, info_span, warn, Instrument};

use crate::auth::permissions::PermissionMatrix;
use crate::auth::roles::Role;
use crate::auth::tokens::{TokenCodec, TokenKind};
use crate::domain::IdentityId;
use crate::errors::{AssayGateError, AuthFailureKind};
use crate::observability::metrics;
use crate::storage::repositories::IdentityRepository;

/// Paths reachable without a token, matched exactly.
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/confirm",
    "/api/v1/auth/challenge",
    "/api/v1/auth/refresh",
    "/api/v1/auth/forgot-password",
    "/api/v1/auth/reset-password",
];

/// Path prefixes reachable without a token (API documentation).
const PUBLIC_PREFIXES: &[&str] = &["/docs"];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Authenticated caller, inserted into request extensions on success.
#[derive(Debug, Clone)]
pub struct RequestPrincipal {
    pub identity_id: IdentityId,
    pub email: String,
    pub role: Role,
    pub superuser: bool,
    pub permissions: PermissionMatrix,
}

/// Shared state for [`authenticate_request`]: the token codec plus the
/// identity store the token subject is re-checked against.
pub struct RequestAuthenticator {
    codec: TokenCodec,
    identities: Arc<dyn IdentityRepository>,
}

pub type RequestAuthenticatorState = Arc<RequestAuthenticator>;

impl RequestAuthenticator {
    pub fn new(codec: TokenCodec, identities: Arc<dyn IdentityRepository>) -> Self {
        Self { codec, identities }
    }

    /// Resolve an `Authorization` header value to a principal.
    ///
    /// Token failures collapse to the generic invalid-token error on the
    /// wire; the precise reason is only recorded in metrics.
    pub async fn resolve(&self, header: Option<&str>) -> Result<RequestPrincipal, AssayGateError> {
        let token = extract_bearer(header)?;

        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(error) => {
                let reason = match error.auth_kind() {
                    Some(AuthFailureKind::ExpiredToken) => "expired",
                    _ => "malformed",
                };
                metrics::record_validation_failure(reason).await;
                return Err(AssayGateError::invalid_token());
            }
        };

        if self.codec.validate_kind(&claims, TokenKind::Access).is_err() {
            metrics::record_validation_failure("wrong_kind").await;
            return Err(AssayGateError::invalid_token());
        }

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

        let permissions = PermissionMatrix::for_role(identity.role);
        Ok(RequestPrincipal {
            identity_id: identity.id,
            email: identity.email,
            role: identity.role,
            superuser: identity.superuser,
            permissions,
        })
    }
}

fn extract_bearer(header: Option<&str>) -> Result<&str, AssayGateError> {
    let header = header.ok_or_else(AssayGateError::missing_token)?;
    let token = header.strip_prefix("Bearer ").ok_or_else(AssayGateError::missing_token)?;
    if token.is_empty() {
        return Err(AssayGateError::missing_token());
    }
    Ok(token)
}

/// Middleware entry point, registered via `middleware::from_fn_with_state`.
pub async fn authenticate_request(
    State(authenticator): State<RequestAuthenticatorState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return Ok(next.run(request).await);
    }

    let method = request.method().clone();
    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "request_authenticator",
        http.method = %method,
        http.path = %path,
        identity.id = field::Empty,
        identity.role = field::Empty,
        correlation_id = %correlation_id
    );

    async move {
        let header =
            request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());

        match authenticator.resolve(header).await {
            Ok(principal) => {
                let span = tracing::Span::current();
                span.record("identity.id", field::display(&principal.identity_id));
                span.record("identity.role", field::display(&principal.role));
                request.extensions_mut().insert(principal);
                Ok(next.run(request).await)
            }
            Err(error) => {
                warn!(%correlation_id, error = %error, "request authentication failed");
                Err(AuthRejection(error))
            }
        }
    }
    .instrument(span)
    .await
}

/// Rejection wrapper rendering an [`AssayGateError`] as a JSON response.
#[derive(Debug)]
pub struct AuthRejection(pub AssayGateError);

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_kind(error: &AssayGateError) -> &'static str {
    match error.auth_kind() {
        Some(AuthFailureKind::MissingToken) => "missing_token",
        Some(AuthFailureKind::InvalidCredentials) => "invalid_credentials",
        Some(AuthFailureKind::InvalidToken) => "invalid_token",
        Some(AuthFailureKind::ExpiredToken) => "expired_token",
        Some(AuthFailureKind::WrongTokenType) => "wrong_token_type",
        Some(AuthFailureKind::AccountDisabled) => "account_disabled",
        Some(AuthFailureKind::Forbidden) => "forbidden",
        None => match error {
            AssayGateError::Validation { .. } | AssayGateError::WeakPassword { .. } => {
                "bad_request"
            }
            AssayGateError::Conflict { .. } => "conflict",
            AssayGateError::NotFound { .. } => "not_found",
            AssayGateError::Integration { .. } => "service_unavailable",
            _ => "internal_error",
        },
    }
}

impl From<AssayGateError> for AuthRejection {
    fn from(error: AssayGateError) -> Self {
        Self(error)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { error: error_kind(&self.0), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}
