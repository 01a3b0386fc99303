//! # Metrics Collection
//!
//! Counters for the authorization endpoint, the cache janitor and the
//! rotation steps. [`init_metrics`] installs a recorder that publishes them
//! as CloudWatch embedded metric format documents on stdout, which the
//! Lambda log sink turns into metrics. [`flush_metrics`] writes one document.

use std::sync::OnceLock;

use metrics::counter;
use metrics_cloudwatch_embedded::{Builder, Collector};
use tracing::{info, warn};

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Collector installed by [`init_metrics`]
static COLLECTOR: OnceLock<&'static Collector> = OnceLock::new();

/// Install the embedded-metrics recorder. Safe to call more than once; only
/// the first call installs.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }
    if COLLECTOR.get().is_some() {
        return Ok(());
    }

    let collector = Builder::new()
        .cloudwatch_namespace(config.metrics_namespace.clone())
        .init()
        .map_err(|e| Error::config(format!("Failed to initialize metrics recorder: {}", e)))?;
    let _ = COLLECTOR.set(collector);

    info!(namespace = %config.metrics_namespace, "Metrics collection initialized");
    Ok(())
}

/// Whether [`init_metrics`] installed a recorder in this process.
pub fn metrics_enabled() -> bool {
    COLLECTOR.get().is_some()
}

/// Write the counters accumulated since the last flush to stdout. No-op
/// until [`init_metrics`] has installed a recorder.
pub fn flush_metrics() {
    if let Some(collector) = COLLECTOR.get() {
        if let Err(e) = collector.flush(std::io::stdout()) {
            warn!(error = %e, "Failed to flush metrics");
        }
    }
}

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Request rejected before authorization (wrong method, path or token).
    pub fn record_bad_request(&self) {
        counter!("secure_lambda_url_bad_requests_total").increment(1);
    }

    /// Authorization that had to consult the secret store.
    pub fn record_secret_request(&self) {
        counter!("secure_lambda_url_secret_requests_total").increment(1);
    }

    pub fn record_authorized(&self) {
        counter!("secure_lambda_url_authorized_total").increment(1);
    }

    pub fn record_unauthorized(&self) {
        counter!("secure_lambda_url_unauthorized_total").increment(1);
    }

    pub fn record_internal_error(&self) {
        counter!("secure_lambda_url_internal_errors_total").increment(1);
    }

    pub fn record_cache_clear(&self) {
        counter!("secure_lambda_url_cache_clears_total").increment(1);
    }

    pub fn record_rotation_step(&self, step: &str, success: bool) {
        let labels = [
            ("step", step.to_string()),
            ("status", if success { "success" } else { "error" }.to_string()),
        ];
        counter!("secure_lambda_url_rotation_steps_total", &labels).increment(1);
    }
}
