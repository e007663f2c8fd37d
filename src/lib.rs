//! # AssayGate
//!
//! AssayGate is the authentication and authorization core for a pharma/CRO
//! assay exchange platform: role-based accounts for pharma scientists, CRO
//! technicians, administrators, and auditors, with sessions carried by
//! locally minted HS256 token pairs.
//!
//! ## Architecture
//!
//! The system follows a layered architecture pattern:
//!
//! ```text
//! Request Authenticator → Auth Facade → Auth Backend (local | managed)
//!          ↓                   ↓                ↓
//!   Permission Matrix   Token Codec   Credential Store / Provider
//! ```
//!
//! ## Core Components
//!
//! - **Auth Facade**: single entry point for login, registration, refresh,
//!   and credential maintenance, enriched with per-role permissions
//! - **Local Backend**: argon2id credentials held in the SQLite store
//! - **Managed Backend**: credentials delegated to an external identity
//!   provider, mirrored locally for authorization
//! - **Request Authenticator**: Axum middleware resolving bearer tokens to
//!   a [`auth::RequestPrincipal`]
//! - **Persistence Layer**: SQLx over SQLite for identities and audit logs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use assaygate::auth::AuthFacade;
//! use assaygate::config::AppConfig;
//! use assaygate::{storage, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let pool = storage::create_pool(&config.database).await?;
//!     storage::run_migrations(&pool).await?;
//!
//!     let facade = AuthFacade::from_config(&config, pool, None)?;
//!     let outcome = facade.authenticate("scientist@example.com", "secret").await?;
//!     assert!(outcome.is_session() || outcome.is_challenge());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod provider;
pub mod storage;

// Re-export commonly used types and traits
pub use auth::{AuthFacade, PermissionMatrix, Role};
pub use config::AppConfig;
pub use errors::{AssayGateError, Result};
pub use observability::{init_logging, init_metrics, init_observability};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
