//! # Structured Logging
//!
//! Both binaries run inside Lambda, whose log sink is plain text captured
//! from stdout, so ANSI colors are always disabled.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{ExtensionConfig, ObservabilityConfig, RotationConfig};
use crate::errors::{Error, Result};

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))
        .map_err(|e| Error::config(format!("Invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logging {
        registry.with(tracing_subscriber::fmt::layer().json().with_ansi(false)).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_ansi(false).with_target(true)).try_init()
    };

    installed.map_err(|e| Error::internal(format!("Failed to set tracing subscriber: {e}")))
}

/// Log the effective extension configuration. Secrets are never included.
pub fn log_extension_config(config: &ExtensionConfig) {
    tracing::info!(
        secret_arn = %config.secret_arn,
        secret_endpoint = %config.secret_endpoint,
        bind_address = %config.bind_address(),
        cache_ttl_seconds = config.cache_ttl_seconds,
        grace_period_seconds = config.grace_period_seconds,
        cool_down_period_seconds = config.cool_down_period_seconds,
        "Secure Lambda URL extension configuration"
    );
}

pub fn log_rotation_config(config: &RotationConfig) {
    tracing::info!(
        secrets_manager_endpoint = %config.secrets_manager_endpoint,
        distribution_id = ?config.distribution_id,
        custom_header_name = ?config.custom_header_name,
        "Secure Lambda URL rotation configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_log_rotation_config() {
        let config = RotationConfig {
            secrets_manager_endpoint: "https://secretsmanager.eu-west-1.amazonaws.com".into(),
            distribution_id: Some("E123".into()),
            custom_header_name: None,
        };

        log_rotation_config(&config);

        assert!(logs_contain("Secure Lambda URL rotation configuration"));
        assert!(logs_contain("E123"));
    }
}
