//! Managed backend end to end: the facade built from config drives the real
//! HTTP provider client against a wiremock gateway, with the identity mirror
//! and locally minted tokens verified on this side.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{send_request, setup_managed_app, TestApp, PASSWORD};
use assaygate::auth::{
    ChallengeKind, Identity, LoginResponse, NewIdentity, PermissionMatrix, RegisterRequest, Role,
    TokenKind,
};
use assaygate::domain::IdentityId;
use assaygate::errors::AuthFailureKind;
use assaygate::storage::{IdentityRepository, SqlxIdentityRepository};

async fn seed_mirror(app: &TestApp, subject: &str, email: &str, role: Role) -> Identity {
    let identities = SqlxIdentityRepository::new(app.pool.clone());
    identities
        .create_identity(NewIdentity {
            id: IdentityId::from_string(subject.to_string()),
            email: email.to_string(),
            display_name: "Provider Mirror".to_string(),
            password_hash: None,
            role,
            active: true,
            superuser: false,
            org_id: None,
        })
        .await
        .expect("seed mirror")
}

fn mock_tokens(access: &str, refresh: Option<&str>) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
    })
}

fn mock_user(subject: &str, email: &str, role: &str) -> serde_json::Value {
    json!({
        "subject": subject,
        "email": email,
        "display_name": "Mira Vale",
        "role_attribute": role,
        "email_verified": true,
    })
}

#[tokio::test]
async fn login_provisions_a_mirror_and_mints_local_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": mock_tokens("prov-access", Some("prov-refresh")),
            "challenge": null,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/get-user"))
        .and(body_partial_json(json!({ "access_token": "prov-access" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_user(
            "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de",
            "mira@helix-pharma.com",
            "pharma_scientist",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let session = app.login("mira@helix-pharma.com", PASSWORD).await;

    // The refresh credential is the provider's; the access token is ours.
    assert_eq!(session.refresh_token, "prov-refresh");
    let claims = app.codec.validate_access_token(&session.access_token).unwrap();
    assert_eq!(claims.sub.as_str(), "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de");
    assert_eq!(claims.role, Role::PharmaScientist);
    assert_eq!(claims.kind, TokenKind::Access);

    assert_eq!(session.permissions, PermissionMatrix::for_role(Role::PharmaScientist));

    // A mirror row now exists, without credential material.
    let identities = SqlxIdentityRepository::new(app.pool.clone());
    let mirror = identities
        .find_by_email("mira@helix-pharma.com")
        .await
        .unwrap()
        .expect("mirror provisioned");
    assert!(mirror.active);
    assert!(mirror.password_hash.is_none());
    assert_eq!(mirror.role, Role::PharmaScientist);
    assert!(mirror.last_login_at.is_some());
}

#[tokio::test]
async fn provider_rejection_maps_to_generic_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "NotAuthorizedException",
            "message": "Incorrect username or password.",
        })))
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let error = app.facade.authenticate("mira@helix-pharma.com", "wrong").await.unwrap_err();

    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
    assert_eq!(error.status_code(), 401);
    // The provider's own wording never reaches the caller.
    assert!(!error.to_string().contains("Incorrect username"));
}

#[tokio::test]
async fn interim_challenge_passes_through_to_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": null,
            "challenge": {
                "name": "NEW_PASSWORD_REQUIRED",
                "session": "challenge-session-9",
                "parameters": {},
            },
        })))
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let outcome = app.facade.authenticate("mira@helix-pharma.com", PASSWORD).await.unwrap();

    match outcome {
        LoginResponse::Challenge(challenge) => {
            assert_eq!(challenge.kind, ChallengeKind::NewPasswordRequired);
            assert_eq!(challenge.session, "challenge-session-9");
        }
        LoginResponse::Session(_) => panic!("expected a challenge"),
    }
}

#[tokio::test]
async fn register_then_confirm_activates_the_mirror() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign-up"))
        .and(body_partial_json(json!({
            "email": "tess@cro-labs.com",
            "attributes": { "custom:role": "cro_technician" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subject": "9be0d3a8-41c7-4f59-9f0e-53e2f3b5d7aa",
            "requires_confirmation": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/confirm-sign-up"))
        .and(body_partial_json(json!({ "email": "tess@cro-labs.com", "code": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let outcome = app
        .facade
        .register(&RegisterRequest {
            email: "tess@cro-labs.com".to_string(),
            display_name: "Tess Park".to_string(),
            password: PASSWORD.to_string(),
            role: Role::CroTechnician,
            org_id: None,
        })
        .await
        .unwrap();
    assert!(outcome.requires_confirmation);
    assert!(!outcome.identity.active);

    let identities = SqlxIdentityRepository::new(app.pool.clone());
    let mirror =
        identities.find_by_email("tess@cro-labs.com").await.unwrap().expect("mirror exists");
    assert!(!mirror.active);

    app.facade.confirm_registration("tess@cro-labs.com", "123456").await.unwrap();

    let mirror =
        identities.find_by_email("tess@cro-labs.com").await.unwrap().expect("mirror exists");
    assert!(mirror.active);
}

#[tokio::test]
async fn refresh_exchanges_with_the_provider_and_echoes_the_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/refresh-tokens"))
        .and(body_partial_json(json!({ "refresh_token": "prov-refresh" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(mock_tokens("prov-access-2", None)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/get-user"))
        .and(body_partial_json(json!({ "access_token": "prov-access-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_user(
            "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de",
            "mira@helix-pharma.com",
            "pharma_scientist",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    seed_mirror(
        &app,
        "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de",
        "mira@helix-pharma.com",
        Role::PharmaScientist,
    )
    .await;

    let tokens = app.facade.refresh("prov-refresh").await.unwrap();

    // The provider does not rotate refresh tokens; ours is the input.
    assert_eq!(tokens.refresh_token, "prov-refresh");
    let claims = app.codec.validate_access_token(&tokens.access_token).unwrap();
    assert_eq!(claims.sub.as_str(), "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de");
}

#[tokio::test]
async fn sign_out_everywhere_revokes_locally_minted_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/refresh-tokens"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(mock_tokens("prov-access-3", None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/global-sign-out"))
        .and(body_partial_json(json!({ "access_token": "prov-access-3" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let mirror = seed_mirror(
        &app,
        "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de",
        "mira@helix-pharma.com",
        Role::PharmaScientist,
    )
    .await;
    let access = app.codec.issue(&mirror, TokenKind::Access).unwrap();
    app.facade.current_user(&access).await.unwrap();

    app.facade.sign_out_everywhere(&mirror.id, "prov-refresh").await.unwrap();

    let error = app.facade.current_user(&access).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidToken));
}

#[tokio::test]
async fn forgot_password_swallows_credential_shaped_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/forgot-password"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "UserNotFoundException",
            "message": "User does not exist.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    // Generic success: the caller cannot learn whether the email exists.
    app.facade.forgot_password("ghost@helix-pharma.com").await.unwrap();
}

#[tokio::test]
async fn provider_outage_surfaces_as_integration_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/forgot-password"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    let error = app.facade.forgot_password("mira@helix-pharma.com").await.unwrap_err();

    assert!(error.auth_kind().is_none());
    assert!(error.status_code() >= 500);
}

#[tokio::test]
async fn managed_tokens_work_through_the_request_authenticator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": mock_tokens("prov-access", Some("prov-refresh")),
            "challenge": null,
        })))
        .mount(&server)
        .await;

    let app = setup_managed_app(&server.uri()).await;
    seed_mirror(
        &app,
        "fd4f9b36-2b62-4e3c-8f11-0a43f1a1c0de",
        "mira@helix-pharma.com",
        Role::PharmaScientist,
    )
    .await;
    let session = app.login("mira@helix-pharma.com", PASSWORD).await;

    let response = send_request(
        &app,
        axum::http::Method::GET,
        "/api/v1/auth/whoami",
        Some(&session.access_token),
        None,
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
