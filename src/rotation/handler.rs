//! Rotation handler and the callbacks that keep the distribution header in
//! step with the secret.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::{RotationContext, RotationRequest, RotationStep};
use crate::config::DistributionTarget;
use crate::distribution::{update_custom_header, DistributionUpdater};
use crate::observability::MetricsRecorder;
use crate::secrets::{BoxError, RotationError, Rotator, SecretApplier, SecretString, SecretTester};

/// Writes the pending secret into the distribution's origin custom header.
pub struct DistributionHeaderApplier {
    updater: Arc<dyn DistributionUpdater>,
    target: Option<DistributionTarget>,
}

impl DistributionHeaderApplier {
    pub fn new(updater: Arc<dyn DistributionUpdater>, target: Option<DistributionTarget>) -> Self {
        Self { updater, target }
    }
}

#[async_trait]
impl SecretApplier for DistributionHeaderApplier {
    async fn apply(&self, _current: &SecretString, pending: &SecretString) -> Result<(), BoxError> {
        let Some(target) = &self.target else {
            tracing::warn!("Distribution update skipped: distribution id or header name not configured");
            return Ok(());
        };

        self.updater
            .update(&target.distribution_id, vec![update_custom_header(&target.header_name, pending.expose_secret())])
            .await?;

        tracing::info!(distribution_id = %target.distribution_id, header = %target.header_name, "Distribution header updated");
        Ok(())
    }
}

/// Checks that every origin carrying the header forwards the pending secret.
pub struct DistributionHeaderTester {
    updater: Arc<dyn DistributionUpdater>,
    target: Option<DistributionTarget>,
}

impl DistributionHeaderTester {
    pub fn new(updater: Arc<dyn DistributionUpdater>, target: Option<DistributionTarget>) -> Self {
        Self { updater, target }
    }
}

#[async_trait]
impl SecretTester for DistributionHeaderTester {
    async fn test(&self, pending: &SecretString) -> Result<(), BoxError> {
        let Some(target) = &self.target else {
            return Ok(());
        };

        let config = self.updater.fetch(&target.distribution_id).await?;
        let values: Vec<&str> = config.header_values(&target.header_name).collect();

        if values.is_empty() {
            return Err(Box::new(RotationError::test_failed(format!(
                "no origin of {} carries header {}",
                target.distribution_id, target.header_name
            ))));
        }
        if !values.iter().all(|v| pending.matches(v)) {
            return Err(Box::new(RotationError::test_failed(format!(
                "header {} on {} does not hold the pending secret",
                target.header_name, target.distribution_id
            ))));
        }
        Ok(())
    }
}

/// Entry point of the rotation function.
pub struct RotationHandler {
    rotator: Arc<dyn Rotator>,
    applier: DistributionHeaderApplier,
    tester: DistributionHeaderTester,
    metrics: MetricsRecorder,
}

impl RotationHandler {
    pub fn new(
        rotator: Arc<dyn Rotator>,
        updater: Arc<dyn DistributionUpdater>,
        target: Option<DistributionTarget>,
    ) -> Self {
        Self {
            rotator,
            applier: DistributionHeaderApplier::new(updater.clone(), target.clone()),
            tester: DistributionHeaderTester::new(updater, target),
            metrics: MetricsRecorder::new(),
        }
    }

    #[instrument(skip(self, request), fields(secret_id = %request.secret_id, step = %request.step))]
    pub async fn handle(&self, request: RotationRequest) -> Result<(), RotationError> {
        let result = self.dispatch(&request).await;

        match &result {
            Ok(()) => tracing::info!("Rotation step completed"),
            Err(e) => tracing::error!(error = %e, "Rotation error occurred"),
        }
        self.metrics.record_rotation_step(&request.step, result.is_ok());

        result
    }

    async fn dispatch(&self, request: &RotationRequest) -> Result<(), RotationError> {
        self.rotator.rotation_enabled(&request.secret_id).await?;

        let RotationContext { secret_id, token, step } = RotationContext::try_from(request)?;
        match step {
            RotationStep::Create => self.rotator.create(&secret_id, &token).await,
            RotationStep::Set => self.rotator.set(&secret_id, &token, Some(&self.applier)).await,
            RotationStep::Test => self.rotator.test(&secret_id, &token, Some(&self.tester)).await,
            RotationStep::Finish => self.rotator.finish(&secret_id, &token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{CustomHeader, DistributionConfig, InMemoryDistributions, Origin};
    use crate::secrets::{DefaultRotator, InMemorySecretStore};
    use tracing_test::traced_test;

    const SECRET: &str = "arn:aws:secretsmanager:eu-west-1:123456789012:secret/key";

    fn target() -> DistributionTarget {
        DistributionTarget { distribution_id: "E123".into(), header_name: "X-Api-Key".into() }
    }

    fn distributions(value: &str) -> Arc<InMemoryDistributions> {
        Arc::new(InMemoryDistributions::new().with_distribution(
            "E123",
            DistributionConfig {
                origins: vec![Origin {
                    id: "lambda".into(),
                    domain_name: "abc.lambda-url.eu-west-1.on.aws".into(),
                    custom_headers: vec![CustomHeader::new("x-api-key", value)],
                }],
            },
        ))
    }

    fn request(step: &str) -> RotationRequest {
        RotationRequest { secret_id: SECRET.into(), client_request_token: "token-1".into(), step: step.into() }
    }

    #[tokio::test]
    async fn test_applier_updates_header() {
        let updater = distributions("old");
        let applier = DistributionHeaderApplier::new(updater.clone(), Some(target()));

        applier.apply(&"old".into(), &"new".into()).await.unwrap();

        let config = updater.fetch("E123").await.unwrap();
        assert_eq!(config.header_values("X-Api-Key").collect::<Vec<_>>(), vec!["new"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_applier_without_target_skips() {
        let updater = distributions("old");
        let applier = DistributionHeaderApplier::new(updater.clone(), None);

        applier.apply(&"old".into(), &"new".into()).await.unwrap();

        assert_eq!(updater.etag("E123").await, Some(1));
        assert!(logs_contain("Distribution update skipped"));
    }

    #[tokio::test]
    async fn test_tester_detects_mismatch() {
        let tester = DistributionHeaderTester::new(distributions("old"), Some(target()));

        assert!(tester.test(&"old".into()).await.is_ok());
        let err = tester.test(&"new".into()).await.unwrap_err();
        assert!(err.to_string().contains("does not hold the pending secret"));
    }

    #[tokio::test]
    async fn test_tester_requires_header() {
        let target = DistributionTarget { header_name: "X-Missing".into(), ..target() };
        let tester = DistributionHeaderTester::new(distributions("old"), Some(target));

        assert!(tester.test(&"old".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_rotation_stops_before_step() {
        let store = Arc::new(InMemorySecretStore::new().with_secret(SECRET, "initial").with_rotation_disabled(SECRET));
        let handler =
            RotationHandler::new(Arc::new(DefaultRotator::new(store.clone())), distributions("initial"), Some(target()));

        let err = handler.handle(request("createSecret")).await.unwrap_err();

        assert!(matches!(err, RotationError::Disabled { .. }));
        assert_eq!(store.calls().get, 0);
        assert_eq!(store.calls().describe, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_step_is_rejected_after_precondition() {
        let store = Arc::new(InMemorySecretStore::new().with_secret(SECRET, "initial"));
        let handler =
            RotationHandler::new(Arc::new(DefaultRotator::new(store.clone())), distributions("initial"), Some(target()));

        let err = handler.handle(request("rollbackSecret")).await.unwrap_err();

        assert!(matches!(err, RotationError::InvalidStep { .. }));
        assert_eq!(store.calls().describe, 1);
        assert!(logs_contain("Rotation error occurred"));
    }

    #[tokio::test]
    async fn test_create_step_dispatched() {
        let store = Arc::new(InMemorySecretStore::new().with_secret(SECRET, "initial"));
        let handler =
            RotationHandler::new(Arc::new(DefaultRotator::new(store.clone())), distributions("initial"), Some(target()));

        handler.handle(request("createSecret")).await.unwrap();

        assert_eq!(store.calls().generate, 1);
        assert_eq!(store.calls().put, 1);
    }
}
