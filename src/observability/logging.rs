//! # Structured Logging
//!
//! Tracing subscriber setup. Output defaults to a human-readable format;
//! set `json_logging` to emit newline-delimited JSON for log aggregation.
//! The `RUST_LOG` environment variable overrides the configured level.

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from configuration.
///
/// Safe to call more than once: if a subscriber is already installed
/// (e.g. by integration tests) the call is a no-op.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    // A second install attempt errors; earlier subscriber wins.
    let _ = if config.json_logging {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(true)
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().with_env_filter(filter).finish(),
        )
    };

    Ok(())
}

/// Log the effective configuration once at startup. Secrets stay out: only
/// shape and toggles are recorded.
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        auth_backend = %config.auth.backend,
        access_ttl_secs = config.auth.access_ttl_secs,
        refresh_ttl_secs = config.auth.refresh_ttl_secs,
        database_type = "sqlite",
        metrics_enabled = %config.observability.enable_metrics,
        json_logging = %config.observability.json_logging,
        "AssayGate authentication core configuration"
    );
}
