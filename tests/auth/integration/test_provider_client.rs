//! HTTP provider client against a wiremock stand-in for the identity
//! provider gateway: request shapes, success decoding, and the error
//! envelope in all its flavors.

use std::collections::HashMap;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assaygate::config::ProviderConfig;
use assaygate::provider::{HttpProviderClient, ProviderClient, ProviderError};

fn client_for(server: &MockServer) -> HttpProviderClient {
    let config = ProviderConfig {
        endpoint: server.uri(),
        client_id: "screening-app".to_string(),
        ..Default::default()
    };
    HttpProviderClient::new(&config).expect("build provider client")
}

#[tokio::test]
async fn initiate_auth_sends_client_id_and_decodes_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .and(body_partial_json(json!({
            "client_id": "screening-app",
            "email": "ada@helix-pharma.com",
            "password": "hunter2!Hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": {
                "access_token": "prov-access",
                "refresh_token": "prov-refresh",
                "expires_in": 3600,
            },
            "challenge": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let flow = client.initiate_auth("ada@helix-pharma.com", "hunter2!Hunter2").await.unwrap();

    let tokens = flow.tokens.expect("tokens present");
    assert_eq!(tokens.access_token, "prov-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("prov-refresh"));
    assert_eq!(tokens.expires_in, 3600);
    assert!(flow.challenge.is_none());
}

#[tokio::test]
async fn initiate_auth_decodes_interim_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": null,
            "challenge": {
                "name": "SOFTWARE_TOKEN_MFA",
                "session": "challenge-session-1",
                "parameters": { "FRIENDLY_DEVICE_NAME": "authenticator" },
            },
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let flow = client.initiate_auth("ada@helix-pharma.com", "pw").await.unwrap();

    assert!(flow.tokens.is_none());
    let challenge = flow.challenge.expect("challenge present");
    assert_eq!(challenge.name, "SOFTWARE_TOKEN_MFA");
    assert_eq!(challenge.session, "challenge-session-1");
    assert_eq!(
        challenge.parameters.get("FRIENDLY_DEVICE_NAME").map(String::as_str),
        Some("authenticator")
    );
}

#[tokio::test]
async fn api_error_preserves_the_provider_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/initiate-auth"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "NotAuthorizedException",
            "message": "Incorrect username or password.",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.initiate_auth("ada@helix-pharma.com", "pw").await.unwrap_err();

    match &error {
        ProviderError::Api { code, message } => {
            assert_eq!(code.as_deref(), Some("NotAuthorizedException"));
            assert_eq!(message, "Incorrect username or password.");
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert!(!error.is_transport());
}

#[tokio::test]
async fn non_json_error_body_becomes_codeless_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/refresh-tokens"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream gateway exploded"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.refresh_tokens("prov-refresh").await.unwrap_err();

    assert_eq!(error.code(), None);
    assert_eq!(error.message(), "upstream gateway exploded");
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    // Nothing listens on the discard port.
    let config = ProviderConfig {
        endpoint: "http://127.0.0.1:9".to_string(),
        client_id: "screening-app".to_string(),
        request_timeout_secs: 2,
        ..Default::default()
    };
    let client = HttpProviderClient::new(&config).unwrap();

    let error = client.forgot_password("ada@helix-pharma.com").await.unwrap_err();
    assert!(error.is_transport());
    assert_eq!(error.code(), None);
}

#[tokio::test]
async fn sign_up_carries_custom_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sign-up"))
        .and(body_partial_json(json!({
            "client_id": "screening-app",
            "email": "tess@cro-labs.com",
            "attributes": { "custom:role": "cro_technician", "name": "Tess Park" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subject": "prov-sub-42",
            "requires_confirmation": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut attributes = HashMap::new();
    attributes.insert("custom:role".to_string(), "cro_technician".to_string());
    attributes.insert("name".to_string(), "Tess Park".to_string());

    let response =
        client.sign_up("tess@cro-labs.com", "hunter2!Hunter2", &attributes).await.unwrap();
    assert_eq!(response.subject, "prov-sub-42");
    assert!(response.requires_confirmation);
}

#[tokio::test]
async fn get_user_decodes_the_account_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get-user"))
        .and(body_partial_json(json!({ "access_token": "prov-access" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subject": "prov-sub-42",
            "email": "tess@cro-labs.com",
            "display_name": "Tess Park",
            "role_attribute": "cro_technician",
            "email_verified": true,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let user = client.get_user("prov-access").await.unwrap();

    assert_eq!(user.subject, "prov-sub-42");
    assert_eq!(user.email, "tess@cro-labs.com");
    assert_eq!(user.display_name, "Tess Park");
    assert_eq!(user.role_attribute.as_deref(), Some("cro_technician"));
    assert!(user.email_verified);
}

#[tokio::test]
async fn associate_software_token_extracts_the_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/associate-software-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secret_code": "JBSWY3DPEHPK3PXP",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let secret = client.associate_software_token("prov-access").await.unwrap();
    assert_eq!(secret, "JBSWY3DPEHPK3PXP");
}

#[tokio::test]
async fn unit_operations_accept_an_empty_object_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/global-sign-out"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.global_sign_out("prov-access").await.unwrap();
}
