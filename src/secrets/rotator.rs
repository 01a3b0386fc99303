//! The four-step rotation protocol: create, set, test, finish.
//!
//! Steps are driven from outside, one event per step, and any of them may
//! be retried. Every step is written so that replaying it is harmless. The
//! rotation token names the version being rotated in.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::error::{BoxError, RotationError};
use super::store::SecretStore;
use super::types::{RandomValueSpec, SecretString, SecretValue, VersionStage};

pub type Result<T> = std::result::Result<T, RotationError>;

/// Propagates a pending secret to whatever consumes it downstream.
#[async_trait]
pub trait SecretApplier: Send + Sync {
    async fn apply(&self, current: &SecretString, pending: &SecretString) -> std::result::Result<(), BoxError>;
}

/// Checks that downstream consumers accept the pending secret.
#[async_trait]
pub trait SecretTester: Send + Sync {
    async fn test(&self, pending: &SecretString) -> std::result::Result<(), BoxError>;
}

#[async_trait]
pub trait Rotator: Send + Sync {
    /// Fails with [`RotationError::Disabled`] when the secret does not rotate.
    async fn rotation_enabled(&self, secret_id: &str) -> Result<()>;

    async fn create(&self, secret_id: &str, token: &str) -> Result<()>;

    async fn set(&self, secret_id: &str, token: &str, applier: Option<&dyn SecretApplier>) -> Result<()>;

    async fn test(&self, secret_id: &str, token: &str, tester: Option<&dyn SecretTester>) -> Result<()>;

    async fn finish(&self, secret_id: &str, token: &str) -> Result<()>;
}

/// Rotator that drives a [`SecretStore`].
pub struct DefaultRotator {
    store: Arc<dyn SecretStore>,
}

impl DefaultRotator {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Pending version for `token`, or `None` when the lookup fails for any
    /// reason.
    async fn pending_for(&self, secret_id: &str, token: &str) -> Option<SecretValue> {
        match self.store.get_secret_value(secret_id, VersionStage::Pending, Some(token)).await {
            Ok(pending) => Some(pending),
            Err(e) => {
                tracing::debug!(secret_id = %secret_id, error = %e, "No pending version for token, skipping step");
                None
            }
        }
    }
}

/// Unwrap errors that already belong to the rotation domain, box the rest.
fn callback_error(e: BoxError) -> RotationError {
    match e.downcast::<RotationError>() {
        Ok(rotation) => *rotation,
        Err(other) => RotationError::Callback(other),
    }
}

#[async_trait]
impl Rotator for DefaultRotator {
    #[instrument(skip(self))]
    async fn rotation_enabled(&self, secret_id: &str) -> Result<()> {
        let description = self.store.describe_secret(secret_id).await?;
        if !description.rotation_enabled {
            return Err(RotationError::disabled(secret_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create(&self, secret_id: &str, token: &str) -> Result<()> {
        // The secret must already have a value to rotate away from.
        self.store.get_secret_value(secret_id, VersionStage::Current, None).await?;

        match self.store.get_secret_value(secret_id, VersionStage::Pending, Some(token)).await {
            Ok(_) => {
                tracing::info!(secret_id = %secret_id, "Pending version already exists for token");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let value = self.store.generate_random_value(&RandomValueSpec::default()).await?;
        self.store.put_secret_value(secret_id, Some(token), &[VersionStage::Pending], &value).await?;

        tracing::info!(secret_id = %secret_id, "Created pending secret version");
        Ok(())
    }

    #[instrument(skip(self, applier))]
    async fn set(&self, secret_id: &str, token: &str, applier: Option<&dyn SecretApplier>) -> Result<()> {
        let Some(applier) = applier else {
            return Ok(());
        };
        let Some(pending) = self.pending_for(secret_id, token).await else {
            return Ok(());
        };

        let current = self.store.get_secret_value(secret_id, VersionStage::Current, None).await?;
        applier.apply(&current.value, &pending.value).await.map_err(callback_error)?;

        tracing::info!(secret_id = %secret_id, "Applied pending secret downstream");
        Ok(())
    }

    #[instrument(skip(self, tester))]
    async fn test(&self, secret_id: &str, token: &str, tester: Option<&dyn SecretTester>) -> Result<()> {
        let Some(tester) = tester else {
            return Ok(());
        };
        let Some(pending) = self.pending_for(secret_id, token).await else {
            return Ok(());
        };

        tester.test(&pending.value).await.map_err(callback_error)?;

        tracing::info!(secret_id = %secret_id, "Pending secret passed downstream test");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn finish(&self, secret_id: &str, token: &str) -> Result<()> {
        let description = self.store.describe_secret(secret_id).await?;

        let holder = description.version_with_stage(VersionStage::Current);
        if holder == Some(token) {
            tracing::info!(secret_id = %secret_id, "Token already holds the current stage");
            return Ok(());
        }

        self.store.update_secret_version_stage(secret_id, VersionStage::Current, token, holder).await?;

        tracing::info!(secret_id = %secret_id, previous_version = ?holder, "Promoted pending version to current");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::testing::{Reply, ScriptedStore};
    use crate::secrets::{SecretDescription, StoreError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const SECRET: &str = "arn:aws:secretsmanager:eu-west-1:123456789012:secret/fake";
    const TOKEN: &str = "f7d3a1c2-rotation";

    fn rotator(store: &Arc<ScriptedStore>) -> DefaultRotator {
        DefaultRotator::new(store.clone())
    }

    fn described(rotation_enabled: bool, versions: &[(&str, VersionStage)]) -> SecretDescription {
        let mut version_to_stages: HashMap<String, Vec<VersionStage>> = HashMap::new();
        for (version, stage) in versions {
            version_to_stages.entry(version.to_string()).or_default().push(*stage);
        }
        SecretDescription { rotation_enabled, version_to_stages }
    }

    #[derive(Default)]
    struct RecordingApplier {
        seen: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl SecretApplier for RecordingApplier {
        async fn apply(&self, current: &SecretString, pending: &SecretString) -> std::result::Result<(), BoxError> {
            self.seen
                .lock()
                .unwrap()
                .push((current.expose_secret().to_string(), pending.expose_secret().to_string()));
            if self.fail {
                return Err("distribution update failed".into());
            }
            Ok(())
        }
    }

    struct RejectingTester;

    #[async_trait]
    impl SecretTester for RejectingTester {
        async fn test(&self, _pending: &SecretString) -> std::result::Result<(), BoxError> {
            Err(Box::new(RotationError::test_failed("header mismatch")))
        }
    }

    #[tokio::test]
    async fn test_rotation_enabled() {
        let store = Arc::new(ScriptedStore::new().describe(described(true, &[])));
        assert!(rotator(&store).rotation_enabled(SECRET).await.is_ok());

        let store = Arc::new(ScriptedStore::new().describe(described(false, &[])));
        let err = rotator(&store).rotation_enabled(SECRET).await.unwrap_err();
        assert!(matches!(err, RotationError::Disabled { .. }));
        assert!(err.to_string().contains(SECRET));
    }

    #[tokio::test]
    async fn test_rotation_enabled_propagates_store_error() {
        let store = Arc::new(ScriptedStore::new());
        let err = rotator(&store).rotation_enabled(SECRET).await.unwrap_err();
        assert!(matches!(err, RotationError::Store(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_generates_when_no_pending() {
        let store = Arc::new(ScriptedStore::new().reply(VersionStage::Current, Reply::value("current")));

        rotator(&store).create(SECRET, TOKEN).await.unwrap();

        assert_eq!(store.generate_calls(), 1);
        assert_eq!(store.put_calls(), 1);
        let puts = store.puts.lock().unwrap();
        let (version, stages, value) = &puts[0];
        assert_eq!(version.as_deref(), Some(TOKEN));
        assert_eq!(stages, &vec![VersionStage::Pending]);
        assert_eq!(value.len(), 64);
    }

    #[tokio::test]
    async fn test_create_replay_is_noop() {
        let store = Arc::new(
            ScriptedStore::new()
                .reply(VersionStage::Current, Reply::value("current"))
                .reply(VersionStage::Pending, Reply::value("pending")),
        );

        rotator(&store).create(SECRET, TOKEN).await.unwrap();

        assert_eq!(store.generate_calls(), 0);
        assert_eq!(store.put_calls(), 0);
        assert!(store
            .requested_versions()
            .contains(&(VersionStage::Pending, Some(TOKEN.to_string()))));
    }

    #[tokio::test]
    async fn test_create_requires_current() {
        let store = Arc::new(ScriptedStore::new());

        let err = rotator(&store).create(SECRET, TOKEN).await.unwrap_err();

        assert!(matches!(err, RotationError::Store(StoreError::NotFound { .. })));
        assert_eq!(store.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_propagates_pending_failure() {
        let store = Arc::new(
            ScriptedStore::new()
                .reply(VersionStage::Current, Reply::value("current"))
                .reply(VersionStage::Pending, Reply::Fail("throttled")),
        );

        let err = rotator(&store).create(SECRET, TOKEN).await.unwrap_err();

        assert!(matches!(err, RotationError::Store(StoreError::ConnectionFailed { .. })));
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_without_applier_makes_no_calls() {
        let store = Arc::new(ScriptedStore::new());
        rotator(&store).set(SECRET, TOKEN, None).await.unwrap();
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_set_passes_current_and_pending() {
        let store = Arc::new(
            ScriptedStore::new()
                .reply(VersionStage::Current, Reply::value("current"))
                .reply(VersionStage::Pending, Reply::value("pending")),
        );
        let applier = RecordingApplier::default();

        rotator(&store).set(SECRET, TOKEN, Some(&applier)).await.unwrap();

        assert_eq!(applier.seen.lock().unwrap().as_slice(), &[("current".to_string(), "pending".to_string())]);
    }

    #[tokio::test]
    async fn test_set_skips_when_pending_missing() {
        let store = Arc::new(ScriptedStore::new().reply(VersionStage::Current, Reply::value("current")));
        let applier = RecordingApplier::default();

        rotator(&store).set(SECRET, TOKEN, Some(&applier)).await.unwrap();

        assert!(applier.seen.lock().unwrap().is_empty());
        assert_eq!(store.get_calls_for(VersionStage::Current), 0);
    }

    #[tokio::test]
    async fn test_set_propagates_current_failure() {
        let store = Arc::new(
            ScriptedStore::new()
                .reply(VersionStage::Current, Reply::Fail("throttled"))
                .reply(VersionStage::Pending, Reply::value("pending")),
        );
        let applier = RecordingApplier::default();

        let err = rotator(&store).set(SECRET, TOKEN, Some(&applier)).await.unwrap_err();

        assert!(matches!(err, RotationError::Store(_)));
        assert!(applier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_propagates_applier_error() {
        let store = Arc::new(
            ScriptedStore::new()
                .reply(VersionStage::Current, Reply::value("current"))
                .reply(VersionStage::Pending, Reply::value("pending")),
        );
        let applier = RecordingApplier { fail: true, ..Default::default() };

        let err = rotator(&store).set(SECRET, TOKEN, Some(&applier)).await.unwrap_err();

        assert!(matches!(err, RotationError::Callback(_)));
        assert_eq!(err.to_string(), "distribution update failed");
    }

    #[tokio::test]
    async fn test_test_step() {
        let store = Arc::new(ScriptedStore::new().reply(VersionStage::Pending, Reply::value("pending")));

        rotator(&store).test(SECRET, TOKEN, None).await.unwrap();
        assert_eq!(store.total_calls(), 0);

        let err = rotator(&store).test(SECRET, TOKEN, Some(&RejectingTester)).await.unwrap_err();
        assert!(matches!(err, RotationError::TestFailed { .. }));
    }

    #[tokio::test]
    async fn test_test_skips_when_pending_missing() {
        let store = Arc::new(ScriptedStore::new());
        rotator(&store).test(SECRET, TOKEN, Some(&RejectingTester)).await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_already_current() {
        let store = Arc::new(
            ScriptedStore::new()
                .describe(described(true, &[(TOKEN, VersionStage::Current), ("v0", VersionStage::Previous)])),
        );

        rotator(&store).finish(SECRET, TOKEN).await.unwrap();

        assert_eq!(store.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_finish_moves_current_from_holder() {
        let store = Arc::new(ScriptedStore::new().describe(described(
            true,
            &[("v1", VersionStage::Current), (TOKEN, VersionStage::Pending)],
        )));

        rotator(&store).finish(SECRET, TOKEN).await.unwrap();

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0], (VersionStage::Current, TOKEN.to_string(), Some("v1".to_string())));
    }
}
