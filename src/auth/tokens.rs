//! HS256 token codec: issuing and validating access and refresh tokens.
//!
//! Both backends mint the same token shape, so request authentication never
//! cares which backend produced a session. Claims carry the token kind (an
//! access token can never be replayed as a refresh token and vice versa) and
//! the identity's `token_version` at issue time, which is re-checked against
//! the store on every authenticated request.
//!
//! Validation runs with zero leeway: a token whose `exp` has passed is
//! rejected immediately. The composite validators collapse every failure
//! mode (bad signature, expiry, wrong kind, malformed payload) into the one
//! generic invalid-token error so callers cannot probe which check failed;
//! the precise reason is logged at debug level before collapsing.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::identity::Identity;
use crate::auth::roles::Role;
use crate::config::AuthConfig;
use crate::domain::IdentityId;
use crate::errors::{AssayGateError, Result};

/// Discriminates the two token flavors inside the signed claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed claims carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: IdentityId,
    /// Normalized email at issue time
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    /// Identity `token_version` at issue time; stale versions are revoked
    pub ver: i64,
    pub iat: i64,
    pub exp: i64,
}

/// An access/refresh pair issued for one session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and validates HS256 tokens for one shared secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact: a token past its exp is rejected immediately.
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            validation,
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    /// Sign a token of the given kind for an identity, stamping the
    /// identity's current `token_version` into the claims.
    pub fn issue(&self, identity: &Identity, kind: TokenKind) -> Result<String> {
        let ttl_secs = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            kind,
            ver: identity.token_version,
            iat: now,
            exp: now + ttl_secs as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            AssayGateError::internal(format!("Failed to sign {} token: {}", kind, e))
        })
    }

    /// Issue a fresh access/refresh pair for an identity.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(identity, TokenKind::Access)?,
            refresh_token: self.issue(identity, TokenKind::Refresh)?,
        })
    }

    /// Decode and verify a token's signature and expiry, preserving the
    /// precise failure. Callers outside this module normally want the
    /// collapsed [`validate_access_token`](Self::validate_access_token) /
    /// [`validate_refresh_token`](Self::validate_refresh_token) instead.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AssayGateError::expired_token()
                }
                _ => AssayGateError::invalid_token(),
            })
    }

    /// Check that decoded claims carry the expected token kind.
    pub fn validate_kind(&self, claims: &Claims, expected: TokenKind) -> Result<()> {
        if claims.kind == expected {
            Ok(())
        } else {
            Err(AssayGateError::wrong_token_type())
        }
    }

    /// Validate an access token end to end, collapsing every failure into
    /// the generic invalid-token error.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        self.validate_for_kind(token, TokenKind::Access)
    }

    /// Validate a refresh token end to end, collapsing every failure into
    /// the generic invalid-token error.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        self.validate_for_kind(token, TokenKind::Refresh)
    }

    fn validate_for_kind(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let claims = self.decode(token).map_err(|e| {
            debug!(expected_kind = %kind, reason = %e, "Token rejected");
            AssayGateError::invalid_token()
        })?;
        self.validate_kind(&claims, kind).map_err(|_| {
            debug!(expected_kind = %kind, presented_kind = %claims.kind, "Token kind mismatch");
            AssayGateError::invalid_token()
        })?;
        Ok(claims)
    }
}
