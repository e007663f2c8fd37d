//! HTTP implementation of [`ProviderClient`].
//!
//! Speaks JSON to a provider gateway: one POST per operation at
//! `{endpoint}/{operation}` with the client id (and optional client secret)
//! in the body. Every call carries the configured request timeout; a call
//! that fails is reported, never retried.

use std::collections::HashMap;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::client::{
    AuthFlowResponse, ProviderClient, ProviderTokens, ProviderUser, SignUpResponse,
};
use super::error::{ProviderError, Result};
use crate::config::ProviderConfig;
use crate::errors::AssayGateError;
use crate::observability::metrics;

/// Provider client speaking JSON over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: Option<String>,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig) -> crate::errors::Result<Self> {
        if config.endpoint.is_empty() {
            return Err(AssayGateError::config("Provider endpoint is not configured"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| {
                AssayGateError::config_with_source(
                    "Failed to build provider HTTP client",
                    Box::new(err),
                )
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// POST one operation and decode the success body.
    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<T> {
        let started = Instant::now();
        let outcome = self.execute(operation, body).await;
        let status = match &outcome {
            Ok(_) => "success",
            Err(ProviderError::Api { .. }) => "api_error",
            Err(ProviderError::Transport { .. }) => "transport_error",
        };
        metrics::record_provider_request(operation, status, started.elapsed()).await;
        outcome
    }

    /// POST one operation, discarding the success body.
    async fn post_unit<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<()> {
        let _: serde_json::Value = self.post(operation, body).await?;
        Ok(())
    }

    #[instrument(skip(self, body), fields(operation = operation), name = "provider_request")]
    async fn execute<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.endpoint, operation);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| ProviderError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(&text, status.as_u16());
            debug!(operation, status = status.as_u16(), code = ?code, "Provider rejected request");
            return Err(ProviderError::Api { code, message });
        }

        response.json::<T>().await.map_err(|err| {
            ProviderError::transport(format!("Failed to decode provider response: {}", err))
        })
    }
}

/// Error payload shape: `{ "code": ..., "message": ... }`, with the
/// provider-native `__type` field honored as a fallback code.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(rename = "__type")]
    provider_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

fn parse_error_body(text: &str, http_status: u16) -> (Option<String>, String) {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => {
            let code = body.code.or(body.provider_type);
            let message =
                body.message.unwrap_or_else(|| format!("HTTP {} from provider", http_status));
            (code, message)
        }
        Err(_) => {
            let message = if text.trim().is_empty() {
                format!("HTTP {} from provider", http_status)
            } else {
                text.trim().to_string()
            };
            (None, message)
        }
    }
}

// Request bodies

#[derive(Serialize)]
struct SignUpBody<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    email: &'a str,
    password: &'a str,
    attributes: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct ConfirmSignUpBody<'a> {
    client_id: &'a str,
    email: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct InitiateAuthBody<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ChallengeResponseBody<'a> {
    client_id: &'a str,
    email: &'a str,
    challenge: &'a str,
    session: &'a str,
    responses: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct RefreshTokensBody<'a> {
    client_id: &'a str,
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct ForgotPasswordBody<'a> {
    client_id: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct ConfirmForgotPasswordBody<'a> {
    client_id: &'a str,
    email: &'a str,
    code: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct ChangePasswordBody<'a> {
    access_token: &'a str,
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct AccessTokenBody<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
struct VerifySoftwareTokenBody<'a> {
    access_token: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct AssociateSoftwareTokenResponse {
    secret_code: String,
}

#[async_trait::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<SignUpResponse> {
        self.post(
            "sign-up",
            &SignUpBody {
                client_id: &self.client_id,
                client_secret: self.client_secret.as_deref(),
                email,
                password,
                attributes,
            },
        )
        .await
    }

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<()> {
        self.post_unit(
            "confirm-sign-up",
            &ConfirmSignUpBody { client_id: &self.client_id, email, code },
        )
        .await
    }

    async fn initiate_auth(&self, email: &str, password: &str) -> Result<AuthFlowResponse> {
        self.post(
            "initiate-auth",
            &InitiateAuthBody {
                client_id: &self.client_id,
                client_secret: self.client_secret.as_deref(),
                email,
                password,
            },
        )
        .await
    }

    async fn respond_to_challenge(
        &self,
        email: &str,
        challenge: &str,
        session: &str,
        responses: &HashMap<String, String>,
    ) -> Result<AuthFlowResponse> {
        self.post(
            "respond-to-challenge",
            &ChallengeResponseBody {
                client_id: &self.client_id,
                email,
                challenge,
                session,
                responses,
            },
        )
        .await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<ProviderTokens> {
        self.post("refresh-tokens", &RefreshTokensBody { client_id: &self.client_id, refresh_token })
            .await
    }

    async fn forgot_password(&self, email: &str) -> Result<()> {
        self.post_unit("forgot-password", &ForgotPasswordBody { client_id: &self.client_id, email })
            .await
    }

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        self.post_unit(
            "confirm-forgot-password",
            &ConfirmForgotPasswordBody { client_id: &self.client_id, email, code, new_password },
        )
        .await
    }

    async fn change_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.post_unit(
            "change-password",
            &ChangePasswordBody { access_token, current_password, new_password },
        )
        .await
    }

    async fn global_sign_out(&self, access_token: &str) -> Result<()> {
        self.post_unit("global-sign-out", &AccessTokenBody { access_token }).await
    }

    async fn associate_software_token(&self, access_token: &str) -> Result<String> {
        let response: AssociateSoftwareTokenResponse =
            self.post("associate-software-token", &AccessTokenBody { access_token }).await?;
        Ok(response.secret_code)
    }

    async fn verify_software_token(&self, access_token: &str, code: &str) -> Result<()> {
        self.post_unit("verify-software-token", &VerifySoftwareTokenBody { access_token, code })
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<ProviderUser> {
        self.post("get-user", &AccessTokenBody { access_token }).await
    }
}
