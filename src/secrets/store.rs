//! The remote secret store interface.

use async_trait::async_trait;

use super::error::Result;
use super::types::{RandomValueSpec, SecretDescription, SecretString, SecretValue, VersionStage};

/// Trait for versioned secret stores that support staged rotation.
///
/// Every secret carries versions, and each stage label (current, previous,
/// pending) sits on at most one version at a time. The authorizer only reads;
/// the rotator drives the full protocol.
///
/// # Security Considerations
///
/// - Implementations MUST NOT log secret values
/// - `NotFound` must be reported as [`StoreError::NotFound`](super::StoreError::NotFound),
///   callers branch on it
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the version carrying `stage`. When `version_id` is given the
    /// version must also match it.
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue>;

    /// Store a new version labelled with `stages`.
    ///
    /// Writing an existing `version_id` with the same value is a no-op.
    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        stages: &[VersionStage],
        value: &SecretString,
    ) -> Result<()>;

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretDescription>;

    /// Move `stage` onto `move_to`, taking it away from `remove_from`.
    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<()>;

    async fn generate_random_value(&self, spec: &RandomValueSpec) -> Result<SecretString>;
}
