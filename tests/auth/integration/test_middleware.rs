//! Request authentication through the full axum stack: public allow-list,
//! bearer extraction, and the credential-store re-checks that make a signed
//! token insufficient on its own.

use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::support::{read_json, seed_identity, send_request, setup_test_app, TestApp, PASSWORD};
use assaygate::auth::{Identity, Role, TokenCodec, TokenKind};
use assaygate::config::AuthConfig;
use assaygate::domain::IdentityId;
use assaygate::storage::{IdentityRepository, SqlxIdentityRepository};

async fn stored_identity(app: &TestApp, id: &IdentityId) -> Identity {
    let identities = SqlxIdentityRepository::new(app.pool.clone());
    identities.find_by_id(id).await.unwrap().expect("identity exists")
}

#[tokio::test]
async fn public_path_bypasses_authentication() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_bearer_returns_unauthorized_json() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/api/v1/molecules", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "missing_token");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn garbage_token_returns_unauthorized_json() {
    let app = setup_test_app().await;

    let response =
        send_request(&app, Method::GET, "/api/v1/molecules", Some("not.a.jwt"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn valid_token_reaches_handler_with_principal() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let response = send_request(
        &app,
        Method::GET,
        "/api/v1/auth/whoami",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = read_json(response).await;
    assert_eq!(body["identity_id"].as_str(), Some(identity.id.to_string().as_str()));
    assert_eq!(body["email"], "ada@helix-pharma.com");
    assert_eq!(body["role"], "pharma_scientist");
    assert_eq!(body["superuser"], false);
}

#[tokio::test]
async fn refresh_token_is_rejected_on_protected_routes() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let refresh = app.codec.issue(&identity, TokenKind::Refresh).unwrap();

    let response =
        send_request(&app, Method::GET, "/api/v1/molecules", Some(&refresh), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;

    let short_lived =
        TokenCodec::new(&AuthConfig { access_ttl_secs: 0, ..app.config.auth.clone() });
    let token = short_lived.issue(&identity, TokenKind::Access).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let response = send_request(&app, Method::GET, "/api/v1/molecules", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn deleted_identity_token_is_rejected() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let identities = SqlxIdentityRepository::new(app.pool.clone());
    identities.delete_identity(&identity.id).await.unwrap();

    let response =
        send_request(&app, Method::GET, "/api/v1/molecules", Some(&session.access_token), None)
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_token_version_is_rejected() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let identities = SqlxIdentityRepository::new(app.pool.clone());
    identities.bump_token_version(&identity.id).await.unwrap();

    let response =
        send_request(&app, Method::GET, "/api/v1/molecules", Some(&session.access_token), None)
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn disabled_identity_is_forbidden_with_distinct_error() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    app.identity_service.deactivate(&identity.id, Some("tests".into())).await.unwrap();

    // Deactivation also bumps the token version, so the pre-deactivation
    // token dies as a stale token rather than revealing account state.
    let response =
        send_request(&app, Method::GET, "/api/v1/molecules", Some(&session.access_token), None)
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A token minted at the current version hits the active check instead.
    let disabled = stored_identity(&app, &identity.id).await;
    let token = app.codec.issue(&disabled, TokenKind::Access).unwrap();
    let response = send_request(&app, Method::GET, "/api/v1/molecules", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_json(response).await;
    assert_eq!(body["error"], "account_disabled");
}

#[tokio::test]
async fn options_requests_bypass_authentication() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::OPTIONS, "/api/v1/molecules", None, None).await;
    // The route only registers GET, so axum answers 405 rather than 401:
    // the middleware let the preflight through.
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
