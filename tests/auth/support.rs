//! Shared fixtures for the auth test suite.
//!
//! Each test gets its own named in-memory SQLite database (shared-cache so
//! the pool's connections see the same data) with migrations applied, plus
//! an [`AuthFacade`] and a router wired through the request-authentication
//! middleware the way a host application would wire it.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::Extension,
    http::{Method, Request, Response},
    middleware,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use assaygate::auth::{
    authenticate_request, AuthFacade, IdentityService, LoginResponse, RequestAuthenticator,
    RequestAuthenticatorState, RequestPrincipal, Role, SessionResponse, TokenCodec,
};
use assaygate::config::{AppConfig, BackendKind};
use assaygate::storage::{self, AuditLogRepository, DbPool, SqlxIdentityRepository};

/// Password that satisfies the default platform policy.
pub const PASSWORD: &str = "Qc-Assay!2024-run7";

pub struct TestApp {
    pub pool: DbPool,
    pub config: AppConfig,
    pub facade: AuthFacade,
    pub identity_service: IdentityService,
    pub codec: TokenCodec,
}

impl TestApp {
    /// Router with one public and two protected routes, guarded by the
    /// request authenticator exactly as a host application registers it.
    pub fn router(&self) -> Router {
        let identities = Arc::new(SqlxIdentityRepository::new(self.pool.clone()));
        let authenticator: RequestAuthenticatorState =
            Arc::new(RequestAuthenticator::new(self.codec.clone(), identities));

        Router::new()
            .route("/health", get(health))
            .route("/api/v1/auth/whoami", get(whoami))
            .route("/api/v1/molecules", get(list_molecules))
            .layer(middleware::from_fn_with_state(authenticator, authenticate_request))
    }

    /// Authenticate and unwrap the session, panicking on a pending challenge.
    pub async fn login(&self, email: &str, password: &str) -> SessionResponse {
        match self.facade.authenticate(email, password).await.expect("authenticate") {
            LoginResponse::Session(session) => session,
            LoginResponse::Challenge(challenge) => {
                panic!("unexpected login challenge: {}", challenge.kind)
            }
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn whoami(Extension(principal): Extension<RequestPrincipal>) -> Json<Value> {
    Json(json!({
        "identity_id": principal.identity_id,
        "email": principal.email,
        "role": principal.role,
        "superuser": principal.superuser,
    }))
}

async fn list_molecules(Extension(_principal): Extension<RequestPrincipal>) -> Json<Value> {
    Json(json!({ "molecules": [] }))
}

async fn build_pool() -> DbPool {
    let url = format!("sqlite:file:assaygate-test-{}?mode=memory&cache=shared", Uuid::new_v4());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("create sqlite pool");
    storage::run_migrations(&pool).await.expect("run migrations");
    pool
}

fn build_app(config: AppConfig, pool: DbPool) -> TestApp {
    let facade =
        AuthFacade::from_config(&config, pool.clone(), None).expect("build auth facade");
    let identities = Arc::new(SqlxIdentityRepository::new(pool.clone()));
    let audit = Arc::new(AuditLogRepository::new(pool.clone()));
    let identity_service =
        IdentityService::new(identities, audit, config.auth.password_policy.clone());
    let codec = TokenCodec::new(&config.auth);

    TestApp { pool, config, facade, identity_service, codec }
}

/// App backed by the local credential store.
pub async fn setup_test_app() -> TestApp {
    build_app(AppConfig::default(), build_pool().await)
}

/// App backed by the managed provider backend pointed at `provider_endpoint`
/// (a wiremock server in these tests).
pub async fn setup_managed_app(provider_endpoint: &str) -> TestApp {
    let mut config = AppConfig::default();
    config.auth.backend = BackendKind::Managed;
    config.provider.endpoint = provider_endpoint.to_string();
    config.provider.client_id = "screening-app".to_string();
    build_app(config, build_pool().await)
}

/// Seed an active identity through the admin service so the stored hash is a
/// real Argon2 hash of [`PASSWORD`].
pub async fn seed_identity(app: &TestApp, email: &str, role: Role) -> assaygate::auth::Identity {
    app.identity_service
        .create_identity(email, PASSWORD, "Test Identity", role, false, None, Some("tests".into()))
        .await
        .expect("seed identity")
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };
    app.router().oneshot(request).await.expect("send request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse response body")
}
