//! # Metrics Collection
//!
//! Provides Prometheus metrics collection for the authentication core.

use crate::config::ObservabilityConfig;
use crate::errors::{AssayGateError, Result};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Metrics recorder that tracks authentication activity
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record an authentication attempt outcome
    pub fn record_auth_attempt(&self, backend: &str, status: &str) {
        counter!("assaygate_auth_attempts_total").increment(1);
        let labels = [("backend", backend.to_string()), ("status", status.to_string())];
        counter!("assaygate_auth_attempts_total", &labels).increment(1);
    }

    /// Record a token issued by the codec
    pub fn record_token_issued(&self, kind: &str) {
        let labels = [("kind", kind.to_string())];
        counter!("assaygate_tokens_issued_total", &labels).increment(1);
    }

    /// Record a token validation failure
    pub fn record_validation_failure(&self, reason: &str) {
        counter!("assaygate_token_validation_failures_total").increment(1);
        let labels = [("reason", reason.to_string())];
        counter!("assaygate_token_validation_failures_total", &labels).increment(1);
    }

    /// Record an identity provider request with execution timing
    pub fn record_provider_request(&self, operation: &str, status: &str, duration: f64) {
        let outcome_labels =
            [("operation", operation.to_string()), ("status", status.to_string())];
        counter!("assaygate_provider_requests_total", &outcome_labels).increment(1);

        let duration_labels = [("operation", operation.to_string())];
        histogram!("assaygate_provider_request_duration_seconds", &duration_labels)
            .record(duration);
    }

    /// Record a completed registration
    pub fn record_registration(&self, backend: &str) {
        counter!("assaygate_registrations_total").increment(1);
        let labels = [("backend", backend.to_string())];
        counter!("assaygate_registrations_total", &labels).increment(1);
    }

    /// Record a password change or reset
    pub fn record_password_change(&self, backend: &str) {
        counter!("assaygate_password_changes_total").increment(1);
        let labels = [("backend", backend.to_string())];
        counter!("assaygate_password_changes_total", &labels).increment(1);
    }

    /// Record a session revocation (sign out everywhere)
    pub fn record_session_revocation(&self, backend: &str) {
        counter!("assaygate_session_revocations_total").increment(1);
        let labels = [("backend", backend.to_string())];
        counter!("assaygate_session_revocations_total", &labels).increment(1);
    }

    /// Register baseline auth metrics so Prometheus exports appear before events occur.
    pub fn register_auth_metrics(&self) {
        describe_counter!(
            "assaygate_auth_attempts_total",
            Unit::Count,
            "Authentication attempts grouped by backend and outcome"
        );
        describe_counter!(
            "assaygate_tokens_issued_total",
            Unit::Count,
            "Session tokens issued grouped by kind"
        );
        describe_counter!(
            "assaygate_token_validation_failures_total",
            Unit::Count,
            "Token validation failures grouped by reason"
        );
        describe_counter!(
            "assaygate_registrations_total",
            Unit::Count,
            "Completed registrations grouped by backend"
        );
        describe_counter!(
            "assaygate_password_changes_total",
            Unit::Count,
            "Password changes and resets grouped by backend"
        );
        describe_counter!(
            "assaygate_session_revocations_total",
            Unit::Count,
            "Sign-out-everywhere revocations grouped by backend"
        );

        counter!("assaygate_auth_attempts_total").absolute(0);
        counter!("assaygate_registrations_total").absolute(0);
        counter!("assaygate_password_changes_total").absolute(0);
        counter!("assaygate_session_revocations_total").absolute(0);

        const STATUSES: &[&str] = &[
            "success",
            "invalid_credentials",
            "account_disabled",
            "challenge",
            "error",
        ];

        for status in STATUSES {
            counter!("assaygate_auth_attempts_total", "backend" => "local", "status" => *status)
                .absolute(0);
            counter!("assaygate_auth_attempts_total", "backend" => "managed", "status" => *status)
                .absolute(0);
        }

        for kind in ["access", "refresh"] {
            counter!("assaygate_tokens_issued_total", "kind" => kind).absolute(0);
        }

        const FAILURE_REASONS: &[&str] = &[
            "expired",
            "malformed",
            "wrong_kind",
            "stale_version",
            "unknown_subject",
            "inactive",
        ];

        for reason in FAILURE_REASONS {
            counter!("assaygate_token_validation_failures_total", "reason" => *reason).absolute(0);
        }
    }

    /// Register identity provider request metrics
    pub fn register_provider_metrics(&self) {
        describe_counter!(
            "assaygate_provider_requests_total",
            Unit::Count,
            "Identity provider requests grouped by operation and outcome"
        );
        describe_histogram!(
            "assaygate_provider_request_duration_seconds",
            Unit::Seconds,
            "Duration of identity provider requests"
        );
    }
}

/// Global metrics recorder instance
static METRICS: once_cell::sync::Lazy<Arc<RwLock<Option<MetricsRecorder>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(RwLock::new(None)));

/// Initialize metrics collection and Prometheus exporter
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics exporter skipped: metrics_port is 0");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        AssayGateError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| {
            AssayGateError::config(format!("Failed to initialize metrics exporter: {}", e))
        })?;

    let recorder = MetricsRecorder::new();
    {
        let mut metrics = METRICS.write().await;
        *metrics = Some(recorder.clone());
    }

    recorder.register_auth_metrics();
    recorder.register_provider_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Prometheus exporter listening"
    );

    Ok(())
}

/// Get the global metrics recorder
pub async fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().await.clone()
}

/// Record an authentication attempt outcome via the global recorder
pub async fn record_auth_attempt(backend: &str, status: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_auth_attempt(backend, status);
    }
}

/// Record a token issued via the global recorder
pub async fn record_token_issued(kind: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_token_issued(kind);
    }
}

/// Record a token validation failure via the global recorder
pub async fn record_validation_failure(reason: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_validation_failure(reason);
    }
}

/// Record an identity provider request via the global recorder
pub async fn record_provider_request(operation: &str, status: &str, duration: Duration) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_provider_request(operation, status, duration.as_secs_f64());
    }
}

/// Record a completed registration via the global recorder
pub async fn record_registration(backend: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_registration(backend);
    }
}

/// Record a password change via the global recorder
pub async fn record_password_change(backend: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_password_change(backend);
    }
}

/// Record a session revocation via the global recorder
pub async fn record_session_revocation(backend: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_session_revocation(backend);
    }
}
