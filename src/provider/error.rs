//! Error types for managed identity provider operations.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors returned by a managed identity provider call.
///
/// `Api` carries the provider's own error code (e.g.
/// `NotAuthorizedException`) so the backend boundary can remap
/// credential-shaped failures; `Transport` covers connect failures and
/// timeouts where no provider response exists. Calls are never retried
/// here; the caller decides based on the remapped error.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("Provider API error: {message}")]
    Api { code: Option<String>, message: String },

    /// The request never produced a provider response (connection refused,
    /// DNS failure, timeout).
    #[error("Provider request failed: {message}")]
    Transport { message: String },
}

impl ProviderError {
    pub fn api(code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api { code, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// The provider's error code, when one was returned.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::Transport { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Api { message, .. } | Self::Transport { message } => message,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
