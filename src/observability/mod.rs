//! # Observability Infrastructure
//!
//! Structured logging through `tracing` and counters through the `metrics`
//! facade. Both binaries call [`init_logging`] and [`init_metrics`] at
//! startup; counters are no-ops until a recorder is installed.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_extension_config, log_rotation_config};
pub use metrics::{flush_metrics, init_metrics, metrics_enabled, MetricsRecorder};
