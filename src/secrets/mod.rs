//! Secret storage, caching, authorization and rotation.
//!
//! # Architecture
//!
//! Everything talks to the remote store through the [`SecretStore`] trait:
//! - **get_secret_value**: fetch the version holding a stage
//! - **put_secret_value**: store a new version under stage labels
//! - **describe_secret**: rotation flag and version-to-stage mapping
//! - **update_secret_version_stage**: move a stage between versions
//! - **generate_random_value**: produce a fresh secret value
//!
//! On top of it sit two independent consumers:
//! - [`DefaultAuthorizer`] checks presented values, backed by a
//!   [`SecretCache`] that rate limits store calls and remembers rejections
//! - [`DefaultRotator`] drives the create/set/test/finish rotation protocol
//!
//! # Supported Backends
//!
//! - **In-memory**: development and tests ([`InMemorySecretStore`])
//! - **AWS Secrets Manager**: behind the `aws` feature

pub mod authorizer;
pub mod cache;
pub mod error;
pub mod memory;
pub mod rotator;
pub mod store;
pub mod types;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(test)]
pub(crate) mod testing;

pub use authorizer::{
    Authorization, Authorizer, AuthorizerConfig, DefaultAuthorizer, DEFAULT_COOL_DOWN_PERIOD,
    DEFAULT_GRACE_PERIOD,
};
pub use cache::{CacheView, CleanupHook, SecretCache, SecretSnapshot, DEFAULT_CLEAR_INTERVAL};
pub use error::{AuthError, BoxError, RotationError, StoreError};
pub use memory::{CallCounts, InMemorySecretStore};
pub use rotator::{DefaultRotator, Rotator, SecretApplier, SecretTester};
pub use store::SecretStore;
pub use types::{RandomValueSpec, SecretDescription, SecretString, SecretValue, VersionStage};

#[cfg(feature = "aws")]
pub use aws::AwsSecretsManagerStore;
