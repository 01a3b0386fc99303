//! # Configuration Settings
//!
//! Runtime configuration for the extension and the rotation function, read
//! from environment variables.

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};
use crate::secrets::AuthorizerConfig;

pub const DEFAULT_HTTP_PORT: u16 = 3579;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 1200;
pub const DEFAULT_GRACE_PERIOD_SECONDS: u64 = 15;
pub const DEFAULT_COOL_DOWN_PERIOD_SECONDS: u64 = 15;

/// Reads one configuration value by name.
pub(crate) trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required(lookup: &impl Lookup, name: &str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::config(format!("Missing required environment variable {name}")))
}

fn optional(lookup: &impl Lookup, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: FromStr>(lookup: &impl Lookup, name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        Some(raw) => raw.trim().parse().map_err(|e| Error::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

fn flag_or(lookup: &impl Lookup, name: &str, default: bool) -> bool {
    optional(lookup, name).map(|s| s.to_lowercase() == "true" || s == "1").unwrap_or(default)
}

/// Configuration of the authorization extension.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtensionConfig {
    /// Secrets Manager endpoint override
    #[validate(length(min = 1, message = "Secret endpoint cannot be empty"))]
    pub secret_endpoint: String,

    /// Secret holding the API key
    #[validate(length(min = 1, message = "Secret ARN cannot be empty"))]
    pub secret_arn: String,

    /// Loopback port of the authorization endpoint
    #[validate(range(min = 1, max = 65535, message = "HTTP port must be between 1 and 65535"))]
    pub http_port: u16,

    /// Interval between wholesale cache clears
    #[validate(range(min = 1, message = "Cache TTL must be at least 1 second"))]
    pub cache_ttl_seconds: u64,

    pub grace_period_seconds: u64,

    pub cool_down_period_seconds: u64,

    /// Token callers must present in `X-Aws-Token`
    #[serde(skip_serializing)]
    pub session_token: String,

    /// Host and port of the Lambda runtime API
    #[validate(length(min = 1, message = "Runtime API cannot be empty"))]
    pub runtime_api: String,
}

impl ExtensionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(lookup: impl Lookup) -> Result<Self> {
        let config = Self {
            secret_endpoint: required(&lookup, "SECURE_LAMBDA_URL_SECRET_ENDPOINT")?,
            secret_arn: required(&lookup, "SECURE_LAMBDA_URL_SECRET_ARN")?,
            http_port: parsed_or(&lookup, "SECURE_LAMBDA_URL_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            cache_ttl_seconds: parsed_or(
                &lookup,
                "SECURE_LAMBDA_URL_CACHE_TTL_SECONDS",
                DEFAULT_CACHE_TTL_SECONDS,
            )?,
            grace_period_seconds: parsed_or(
                &lookup,
                "SECURE_LAMBDA_URL_GRACE_PERIOD_SECONDS",
                DEFAULT_GRACE_PERIOD_SECONDS,
            )?,
            cool_down_period_seconds: parsed_or(
                &lookup,
                "SECURE_LAMBDA_URL_COOL_DOWN_PERIOD_SECONDS",
                DEFAULT_COOL_DOWN_PERIOD_SECONDS,
            )?,
            session_token: lookup("AWS_SESSION_TOKEN").unwrap_or_default(),
            runtime_api: required(&lookup, "AWS_LAMBDA_RUNTIME_API")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn authorizer_config(&self) -> AuthorizerConfig {
        AuthorizerConfig::default()
            .with_grace_period(Duration::from_secs(self.grace_period_seconds))
            .with_cool_down_period(Duration::from_secs(self.cool_down_period_seconds))
    }

    /// The authorization endpoint only listens on loopback.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.http_port))
    }
}

/// Configuration of the rotation function.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RotationConfig {
    #[validate(length(min = 1, message = "Secrets Manager endpoint cannot be empty"))]
    pub secrets_manager_endpoint: String,

    pub distribution_id: Option<String>,

    /// Origin custom header carrying the API key
    pub custom_header_name: Option<String>,
}

impl RotationConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(lookup: impl Lookup) -> Result<Self> {
        let config = Self {
            secrets_manager_endpoint: required(&lookup, "SECRETS_MANAGER_ENDPOINT")?,
            distribution_id: optional(&lookup, "DISTRIBUTION_ID"),
            custom_header_name: optional(&lookup, "CUSTOM_HEADER_NAME"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Distribution and header to keep in sync, when both are configured.
    pub fn distribution_target(&self) -> Option<DistributionTarget> {
        match (&self.distribution_id, &self.custom_header_name) {
            (Some(id), Some(header)) => {
                Some(DistributionTarget { distribution_id: id.clone(), header_name: header.clone() })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTarget {
    pub distribution_id: String,
    pub header_name: String,
}

/// Logging configuration shared by both binaries.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// When false only errors are logged
    pub debug: bool,

    /// Emit counters as CloudWatch embedded metrics on stdout
    pub enable_metrics: bool,

    /// CloudWatch namespace the counters are published under
    #[validate(length(min = 1, max = 255, message = "Metrics namespace must be 1-255 characters"))]
    pub metrics_namespace: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            debug: true,
            enable_metrics: true,
            metrics_namespace: "SecureLambdaUrl".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub(crate) fn from_lookup(lookup: impl Lookup) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            log_level: optional(&lookup, "SECURE_LAMBDA_URL_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: flag_or(&lookup, "SECURE_LAMBDA_URL_JSON_LOGS", defaults.json_logging),
            debug: flag_or(&lookup, "SECURE_LAMBDA_URL_DEBUG", defaults.debug),
            enable_metrics: flag_or(&lookup, "SECURE_LAMBDA_URL_ENABLE_METRICS", defaults.enable_metrics),
            metrics_namespace: optional(&lookup, "SECURE_LAMBDA_URL_METRICS_NAMESPACE")
                .unwrap_or(defaults.metrics_namespace),
        };
        config.validate()?;
        Ok(config)
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn filter_directive(&self) -> &str {
        if self.debug {
            &self.log_level
        } else {
            "error"
        }
    }
}
