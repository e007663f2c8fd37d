//! End-to-end login lifecycle on the local backend: authenticate, use the
//! session, refresh it, and lose it on password change or deactivation.

use crate::support::{seed_identity, setup_test_app, PASSWORD};
use assaygate::auth::{Action, PermissionMatrix, RegisterRequest, Resource, Role};
use assaygate::errors::AuthFailureKind;

#[tokio::test]
async fn login_returns_session_with_permission_matrix() {
    let app = setup_test_app().await;
    seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;

    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_token.is_empty());
    assert_eq!(session.identity.email, "ada@helix-pharma.com");
    assert_eq!(session.identity.role, Role::PharmaScientist);
    assert_eq!(session.permissions, PermissionMatrix::for_role(Role::PharmaScientist));
    assert!(session.permissions.allows(Resource::Molecules, Action::Create));
    assert!(!session.permissions.allows(Resource::Users, Action::Delete));
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() {
    let app = setup_test_app().await;
    seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;

    let session = app.login("  ADA@Helix-Pharma.COM ", PASSWORD).await;
    assert_eq!(session.identity.email, "ada@helix-pharma.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let app = setup_test_app().await;
    seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;

    let wrong_password =
        app.facade.authenticate("ada@helix-pharma.com", "Wr0ng-Password!99").await.unwrap_err();
    let unknown_email =
        app.facade.authenticate("ghost@helix-pharma.com", PASSWORD).await.unwrap_err();

    assert_eq!(wrong_password.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
    assert_eq!(unknown_email.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(wrong_password.status_code(), 401);
}

#[tokio::test]
async fn disabled_identity_cannot_login() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    app.identity_service.deactivate(&identity.id, Some("tests".into())).await.unwrap();

    let error = app.facade.authenticate("ada@helix-pharma.com", PASSWORD).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::AccountDisabled));
    assert_eq!(error.status_code(), 403);
}

#[tokio::test]
async fn self_registration_creates_active_identity() {
    let app = setup_test_app().await;

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

    assert!(!outcome.requires_confirmation);
    assert!(outcome.identity.active);
    assert_eq!(outcome.identity.role, Role::CroTechnician);

    let session = app.login("tess@cro-labs.com", PASSWORD).await;
    assert_eq!(session.identity.id, outcome.identity.id);
}

#[tokio::test]
async fn refresh_exchanges_for_a_fresh_access_token() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let refreshed = app.facade.refresh(&session.refresh_token).await.unwrap();
    assert_eq!(refreshed.identity.id, identity.id);

    let user = app.facade.current_user(&refreshed.access_token).await.unwrap();
    assert_eq!(user.identity.email, "ada@helix-pharma.com");
}

#[tokio::test]
async fn access_token_is_not_accepted_for_refresh() {
    let app = setup_test_app().await;
    seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let error = app.facade.refresh(&session.access_token).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidToken));
}

#[tokio::test]
async fn change_password_revokes_every_outstanding_session() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;
    let new_password = "N3w-Assay!2025-run1";

    app.facade
        .change_password(&identity.id, &session.access_token, PASSWORD, new_password)
        .await
        .unwrap();

    // Both halves of the old session are dead.
    let error = app.facade.current_user(&session.access_token).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidToken));
    let error = app.facade.refresh(&session.refresh_token).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidToken));

    // Old password no longer works, the new one does.
    let error = app.facade.authenticate("ada@helix-pharma.com", PASSWORD).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidCredentials));
    app.login("ada@helix-pharma.com", new_password).await;
}

#[tokio::test]
async fn weak_new_password_is_rejected_before_anything_changes() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let error = app
        .facade
        .change_password(&identity.id, &session.access_token, PASSWORD, "weak")
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), 400);

    // The old session and password still work.
    app.facade.current_user(&session.access_token).await.unwrap();
    app.login("ada@helix-pharma.com", PASSWORD).await;
}

#[tokio::test]
async fn sign_out_everywhere_revokes_sessions() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    app.facade.sign_out_everywhere(&identity.id, &session.access_token).await.unwrap();

    let error = app.facade.current_user(&session.access_token).await.unwrap_err();
    assert_eq!(error.auth_kind(), Some(AuthFailureKind::InvalidToken));

    // Credentials are untouched; a fresh login works.
    app.login("ada@helix-pharma.com", PASSWORD).await;
}

#[tokio::test]
async fn provider_only_operations_are_rejected_on_the_local_backend() {
    let app = setup_test_app().await;
    let identity = seed_identity(&app, "ada@helix-pharma.com", Role::PharmaScientist).await;
    let session = app.login("ada@helix-pharma.com", PASSWORD).await;

    let forgot = app.facade.forgot_password("ada@helix-pharma.com").await.unwrap_err();
    assert_eq!(forgot.status_code(), 400);

    let mfa = app.facade.setup_mfa(&identity.id, &session.access_token).await.unwrap_err();
    assert_eq!(mfa.status_code(), 400);
    assert!(mfa.to_string().contains("local"));
}
