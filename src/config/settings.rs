//! # Configuration Settings
//!
//! Defines the configuration structure for the AssayGate auth core.
//!
//! Each section has sane defaults, an environment overlay (`ASSAYGATE_*`
//! variables), and `validator` rules; cross-field rules that the derive
//! cannot express live in `validate_custom`.

use crate::errors::{AssayGateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Top-level configuration, assembled from defaults plus the environment
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Backend selection, token signing, and password policy
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Managed identity provider endpoint and credentials
    #[validate(nested)]
    pub provider: ProviderConfig,

    /// SQLite store settings
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Logging and metrics settings
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables, then validate it
    pub fn from_env() -> Result<Self> {
        let config = Self {
            auth: AuthConfig::from_env()?,
            provider: ProviderConfig::from_env(),
            database: DatabaseConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(AssayGateError::from)?;
        self.validate_custom()
    }

    /// Cross-field rules the `validator` derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if self.auth.token_secret.len() < 32 {
            return Err(AssayGateError::validation(
                "Token signing secret must be at least 32 characters long",
            ));
        }

        // Refresh tokens must outlive access tokens
        if self.auth.refresh_ttl_secs <= self.auth.access_ttl_secs {
            return Err(AssayGateError::validation(
                "Refresh token TTL must be greater than access token TTL",
            ));
        }

        if !self.database.url.starts_with("sqlite://") {
            return Err(AssayGateError::validation("Database URL must start with 'sqlite://'"));
        }

        // The managed backend cannot run without a provider to talk to
        if self.auth.backend == BackendKind::Managed {
            if self.provider.endpoint.is_empty() {
                return Err(AssayGateError::validation(
                    "Provider endpoint is required when the managed backend is selected",
                ));
            }
            if self.provider.client_id.is_empty() {
                return Err(AssayGateError::validation(
                    "Provider client ID is required when the managed backend is selected",
                ));
            }
        }

        Ok(())
    }
}

/// Which authentication backend the facade is constructed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Credentials verified against the platform's own credential store
    #[default]
    Local,
    /// Credential lifecycle delegated to a managed identity provider
    Managed,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Managed => "managed",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an invalid backend kind
#[derive(Debug, thiserror::Error)]
#[error("invalid auth backend: {value} (expected 'local' or 'managed')")]
pub struct BackendKindParseError {
    pub value: String,
}

impl FromStr for BackendKind {
    type Err = BackendKindParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(BackendKind::Local),
            "managed" => Ok(BackendKind::Managed),
            other => Err(BackendKindParseError { value: other.to_string() }),
        }
    }
}

/// Authentication and authorization configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// Which backend strategy to construct the facade with
    pub backend: BackendKind,

    /// HMAC secret for token signing/verification
    #[validate(length(min = 1, message = "Token secret cannot be empty"))]
    pub token_secret: String,

    /// Access token TTL in seconds
    #[validate(range(
        min = 60,
        max = 86400,
        message = "Access token TTL must be between 1 minute and 24 hours"
    ))]
    pub access_ttl_secs: u64,

    /// Refresh token TTL in seconds
    #[validate(range(
        min = 3600,
        max = 2592000,
        message = "Refresh token TTL must be between 1 hour and 30 days"
    ))]
    pub refresh_ttl_secs: u64,

    /// Token issuer, also used as the label in TOTP provisioning URIs
    #[validate(length(min = 1, message = "Issuer cannot be empty"))]
    pub issuer: String,

    /// Password policy applied to registration, change, and reset
    #[validate(nested)]
    pub password_policy: PasswordPolicyConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            token_secret: "assaygate-default-secret-change-in-production".to_string(),
            access_ttl_secs: 1800,    // 30 minutes
            refresh_ttl_secs: 604800, // 7 days
            issuer: "assaygate".to_string(),
            password_policy: PasswordPolicyConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Get access token TTL as Duration
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// Get refresh token TTL as Duration
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// Create AuthConfig from environment variables.
    ///
    /// A present but unparseable `ASSAYGATE_AUTH_BACKEND` is an error, not a
    /// silent fallback: starting the wrong backend is worse than not starting.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("ASSAYGATE_AUTH_BACKEND") {
            Ok(value) => value
                .parse::<BackendKind>()
                .map_err(|e| AssayGateError::config(e.to_string()))?,
            Err(_) => defaults.backend,
        };

        Ok(Self {
            backend,
            token_secret: env_string("ASSAYGATE_TOKEN_SECRET", defaults.token_secret),
            access_ttl_secs: env_parsed("ASSAYGATE_ACCESS_TTL_SECS", defaults.access_ttl_secs),
            refresh_ttl_secs: env_parsed("ASSAYGATE_REFRESH_TTL_SECS", defaults.refresh_ttl_secs),
            issuer: env_string("ASSAYGATE_TOKEN_ISSUER", defaults.issuer),
            password_policy: PasswordPolicyConfig::from_env(),
        })
    }
}

/// Password policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PasswordPolicyConfig {
    /// Minimum password length
    #[validate(range(min = 8, max = 128, message = "Minimum length must be between 8 and 128"))]
    pub min_length: usize,

    /// Require at least one uppercase letter
    pub require_uppercase: bool,

    /// Require at least one lowercase letter
    pub require_lowercase: bool,

    /// Require at least one digit
    pub require_digit: bool,

    /// Require at least one non-alphanumeric character
    pub require_special: bool,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicyConfig {
    /// Create PasswordPolicyConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            min_length: env_parsed("ASSAYGATE_PASSWORD_MIN_LENGTH", defaults.min_length),
            require_uppercase: env_flag("ASSAYGATE_PASSWORD_REQUIRE_UPPERCASE", true),
            require_lowercase: env_flag("ASSAYGATE_PASSWORD_REQUIRE_LOWERCASE", true),
            require_digit: env_flag("ASSAYGATE_PASSWORD_REQUIRE_DIGIT", true),
            require_special: env_flag("ASSAYGATE_PASSWORD_REQUIRE_SPECIAL", true),
        }
    }
}

/// Managed identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Base URL of the managed identity provider API. Required when the
    /// managed backend is selected (checked in `validate_custom`).
    pub endpoint: String,

    /// Application client ID registered with the provider
    pub client_id: String,

    /// Optional application client secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Per-request timeout in seconds for provider calls
    #[validate(range(
        min = 1,
        max = 120,
        message = "Provider timeout must be between 1 and 120 seconds"
    ))]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            client_id: String::new(),
            client_secret: None,
            request_timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    /// Get provider request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Create ProviderConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            endpoint: env_string("ASSAYGATE_PROVIDER_ENDPOINT", defaults.endpoint),
            client_id: env_string("ASSAYGATE_PROVIDER_CLIENT_ID", defaults.client_id),
            client_secret: std::env::var("ASSAYGATE_PROVIDER_CLIENT_SECRET").ok(),
            request_timeout_secs: env_parsed(
                "ASSAYGATE_PROVIDER_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
        }
    }
}

/// SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Connection URL, `sqlite://` schemes only
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Upper bound on pooled connections
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Connections kept open even when idle
    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Seconds to wait for a connection before giving up
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Seconds before an idle connection is closed (0 keeps them open)
    pub idle_timeout_seconds: u64,

    /// Apply pending migrations as soon as the pool opens
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/assaygate.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600, // 10 minutes
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Idle timeout as a `Duration`, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            url: env_string("DATABASE_URL", defaults.url),
            max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_parsed("DATABASE_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout_seconds: env_parsed(
                "DATABASE_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            ),
            idle_timeout_seconds: env_parsed(
                "DATABASE_IDLE_TIMEOUT_SECONDS",
                defaults.idle_timeout_seconds,
            ),
            auto_migrate: env_flag("DATABASE_AUTO_MIGRATE", defaults.auto_migrate),
        }
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Base log level; `RUST_LOG` overrides it when set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit newline-delimited JSON instead of the human format
    pub json_logging: bool,

    /// Collect and export Prometheus metrics
    pub enable_metrics: bool,

    /// Prometheus exporter port (0 disables the exporter)
    pub metrics_port: u16,

    /// Service label attached to every exported metric
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            enable_metrics: true,
            metrics_port: 9090,
            service_name: "assaygate".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Exporter bind address, `None` when the port is 0
    pub fn metrics_bind_address(&self) -> Option<String> {
        (self.metrics_port > 0).then(|| format!("0.0.0.0:{}", self.metrics_port))
    }

    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            log_level: env_string("ASSAYGATE_LOG_LEVEL", defaults.log_level),
            json_logging: env_flag("ASSAYGATE_JSON_LOGGING", defaults.json_logging),
            enable_metrics: env_flag("ASSAYGATE_ENABLE_METRICS", defaults.enable_metrics),
            metrics_port: env_parsed("ASSAYGATE_METRICS_PORT", defaults.metrics_port),
            service_name: env_string("ASSAYGATE_SERVICE_NAME", defaults.service_name),
        }
    }
}

// Environment overlay helpers. Absent variables fall back to the default;
// unparseable numeric values do too rather than aborting startup.

fn env_string(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => raw == "1" || raw.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}
