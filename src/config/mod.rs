//! # Configuration Management
//!
//! Environment-driven configuration for both binaries. Each struct has a
//! `from_env()` constructor that applies defaults and validates the result.

pub mod settings;

pub use settings::{
    DistributionTarget, ExtensionConfig, ObservabilityConfig, RotationConfig, DEFAULT_CACHE_TTL_SECONDS,
    DEFAULT_COOL_DOWN_PERIOD_SECONDS, DEFAULT_GRACE_PERIOD_SECONDS, DEFAULT_HTTP_PORT,
};
