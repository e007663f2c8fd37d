//! # Configuration Management
//!
//! Typed configuration for the AssayGate auth core: backend selection, token
//! signing and TTLs, password policy, provider endpoint, database pool, and
//! observability switches. See [`settings::AppConfig::from_env`] for the
//! environment overlay.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, BackendKind, DatabaseConfig, ObservabilityConfig,
    PasswordPolicyConfig, ProviderConfig,
};
