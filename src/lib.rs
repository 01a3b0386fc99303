//! # Secure Lambda URL
//!
//! API key authorization for Lambda function URLs against a secret that
//! rotates, plus the rotation protocol that keeps the key and the CDN in
//! front of the function in step.
//!
//! ## Architecture
//!
//! ```text
//! function handler → loopback server → Authorizer → SecretCache → SecretStore
//! rotation event   → RotationHandler → Rotator → SecretStore
//!                                          ↘ DistributionUpdater (set/test callbacks)
//! ```
//!
//! ## Core Components
//!
//! - **Authorizer**: checks presented keys, tolerating the previous and
//!   pending versions for a short grace period around a rotation
//! - **SecretCache**: the three cached versions plus a blacklist of rejected
//!   values, wiped on an interval by a background janitor
//! - **Rotator**: the idempotent create/set/test/finish rotation steps
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use secure_lambda_url::secrets::{
//!     Authorizer, AuthorizerConfig, DefaultAuthorizer, InMemorySecretStore, SecretCache,
//! };
//!
//! # async fn example() {
//! let store = Arc::new(InMemorySecretStore::new().with_secret("api-key", "s3cr3t"));
//! let cache = Arc::new(SecretCache::with_defaults());
//! let authorizer = DefaultAuthorizer::new(store, cache, AuthorizerConfig::default());
//!
//! let outcome = authorizer.authorize("api-key", "s3cr3t").await;
//! assert!(outcome.is_authorized());
//! # }
//! ```

pub mod config;
pub mod distribution;
pub mod errors;
pub mod extension;
pub mod observability;
pub mod rotation;
pub mod secrets;
pub mod utils;

// Re-export commonly used types and traits
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
