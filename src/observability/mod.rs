//! # Observability Infrastructure
//!
//! Structured logging plus Prometheus metrics for the AssayGate auth core.
//! Embedding services call [`init_observability`] once at startup; library
//! code records through the `tracing` macros and the global metrics helpers.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Bring up logging first so metrics setup problems are visible, then the
/// exporter if enabled.
pub async fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;

    if config.enable_metrics {
        init_metrics(config).await?;
    }

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        metrics_enabled = %config.enable_metrics,
        "Observability ready"
    );

    Ok(())
}
