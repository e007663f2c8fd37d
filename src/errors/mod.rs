//! # Error Handling
//!
//! Crate-wide error types for the AssayGate auth core, built with `thiserror`.
//!
//! Expected authentication outcomes (bad credentials, expired tokens,
//! disabled accounts, ...) travel as [`AssayGateError::Auth`] with a closed
//! [`AuthFailureKind`] vocabulary so callers can branch without string
//! matching. Provider faults are the only retryable category; their original
//! error code and message are preserved on the variant for logging but are
//! never rendered through `Display`, so they cannot leak to untrusted
//! callers.

use std::fmt;

/// Custom result type for AssayGate operations
pub type Result<T> = std::result::Result<T, AssayGateError>;

/// Main error type for the AssayGate auth core
#[derive(thiserror::Error, Debug)]
pub enum AssayGateError {
    /// Startup and environment configuration problems
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Credential store and audit log storage failures
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// JSON encode/decode failures (audit metadata, provider payloads)
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Rejected input, from the `validator` derives or hand-rolled checks
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Expected authentication and authorization outcomes
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        kind: AuthFailureKind,
    },

    /// Password rejected by the platform password policy
    #[error("Password does not meet policy: {message}")]
    WeakPassword { message: String },

    /// Operation not available on the active auth backend
    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: String,
        backend: String,
    },

    /// Managed identity provider faults (transport, timeout, unexpected
    /// provider errors). `code` and `message` keep the provider's original
    /// error for logs; `Display` deliberately omits both.
    #[error("Identity provider request failed during '{operation}'")]
    Integration {
        operation: String,
        code: Option<String>,
        message: String,
    },

    /// Bugs and unclassified failures
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Addressed resource does not exist
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound {
        resource_type: String,
        id: String,
    },

    /// Write collided with existing state (duplicate email, mostly)
    #[error("Resource conflict: {message}")]
    Conflict {
        message: String,
        resource_type: String,
    },
}

/// Authentication failure subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    InvalidCredentials,
    AccountDisabled,
    MissingToken,
    InvalidToken,
    ExpiredToken,
    WrongTokenType,
    Forbidden,
}

impl fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailureKind::InvalidCredentials => write!(f, "invalid_credentials"),
            AuthFailureKind::AccountDisabled => write!(f, "account_disabled"),
            AuthFailureKind::MissingToken => write!(f, "missing_token"),
            AuthFailureKind::InvalidToken => write!(f, "invalid_token"),
            AuthFailureKind::ExpiredToken => write!(f, "expired_token"),
            AuthFailureKind::WrongTokenType => write!(f, "wrong_token_type"),
            AuthFailureKind::Forbidden => write!(f, "forbidden"),
        }
    }
}

impl AssayGateError {
    /// Configuration error without an underlying cause
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Configuration error wrapping the failure behind it
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a sqlx error with a line of context about the failed operation
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    /// Validation failure not tied to one field
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Validation failure naming the offending field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error with an explicit failure kind
    pub fn auth<S: Into<String>>(message: S, kind: AuthFailureKind) -> Self {
        Self::Auth { message: message.into(), kind }
    }

    /// Rejected credentials. One message for both unknown email and wrong
    /// password so the two cases stay indistinguishable to callers.
    pub fn invalid_credentials() -> Self {
        Self::auth("Invalid email or password", AuthFailureKind::InvalidCredentials)
    }

    /// Authentication against a deactivated account
    pub fn account_disabled() -> Self {
        Self::auth("Account is disabled", AuthFailureKind::AccountDisabled)
    }

    /// No bearer token on a protected request
    pub fn missing_token() -> Self {
        Self::auth("Missing authentication token", AuthFailureKind::MissingToken)
    }

    /// Token failed validation. Also the collapsed form for expired and
    /// wrong-kind failures at trust boundaries.
    pub fn invalid_token() -> Self {
        Self::auth("Invalid or expired token", AuthFailureKind::InvalidToken)
    }

    /// Token signature verified but the expiry has passed
    pub fn expired_token() -> Self {
        Self::auth("Token has expired", AuthFailureKind::ExpiredToken)
    }

    /// Access token presented where a refresh token is required, or vice versa
    pub fn wrong_token_type() -> Self {
        Self::auth("Token type not valid for this operation", AuthFailureKind::WrongTokenType)
    }

    /// Role or permission check failed for an authenticated principal
    pub fn forbidden() -> Self {
        Self::auth("Insufficient permissions", AuthFailureKind::Forbidden)
    }

    /// Create a weak-password error listing the failed policy rules
    pub fn weak_password<S: Into<String>>(message: S) -> Self {
        Self::WeakPassword { message: message.into() }
    }

    /// Create an unsupported-operation error for the named backend
    pub fn unsupported<O: Into<String>, B: Into<String>>(operation: O, backend: B) -> Self {
        Self::UnsupportedOperation { operation: operation.into(), backend: backend.into() }
    }

    /// Create a provider integration error without a provider error code
    /// (transport failures, timeouts)
    pub fn integration<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Integration { operation: operation.into(), code: None, message: message.into() }
    }

    /// Create a provider integration error preserving the provider's error code
    pub fn integration_with_code<O: Into<String>, C: Into<String>, M: Into<String>>(
        operation: O,
        code: C,
        message: M,
    ) -> Self {
        Self::Integration {
            operation: operation.into(),
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Unexpected internal failure
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Lookup miss for `resource_type` under `id`
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Uniqueness or state conflict on `resource_type`
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// The authentication failure kind, when this is an `Auth` error
    pub fn auth_kind(&self) -> Option<AuthFailureKind> {
        match self {
            AssayGateError::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Original provider error detail, when this is an `Integration` error.
    /// For log sites only; never include in responses.
    pub fn integration_detail(&self) -> Option<(Option<&str>, &str)> {
        match self {
            AssayGateError::Integration { code, message, .. } => {
                Some((code.as_deref(), message.as_str()))
            }
            _ => None,
        }
    }

    /// HTTP status this error maps to at the API boundary
    pub fn status_code(&self) -> u16 {
        match self {
            AssayGateError::Config { .. } => 500,
            AssayGateError::Database { .. } => 500,
            AssayGateError::Serialization { .. } => 400,
            AssayGateError::Validation { .. } => 400,
            AssayGateError::Auth { kind: AuthFailureKind::Forbidden, .. } => 403,
            AssayGateError::Auth { kind: AuthFailureKind::AccountDisabled, .. } => 403,
            AssayGateError::Auth { .. } => 401,
            AssayGateError::WeakPassword { .. } => 400,
            AssayGateError::UnsupportedOperation { .. } => 400,
            AssayGateError::Integration { .. } => 502,
            AssayGateError::Internal { .. } => 500,
            AssayGateError::NotFound { .. } => 404,
            AssayGateError::Conflict { .. } => 409,
        }
    }

    /// Check if this error should be retried. Provider integration faults are
    /// the only transient category; every other outcome is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssayGateError::Integration { .. })
    }
}

impl From<sqlx::Error> for AssayGateError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for AssayGateError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for AssayGateError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut parts: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let reasons: Vec<String> = field_errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("failed rule '{}'", e.code),
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        // field_errors() is a HashMap; sort for a deterministic message
        parts.sort();

        Self::validation(format!("Validation failed: {}", parts.join("; ")))
    }
}
