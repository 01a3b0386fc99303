//! AWS Secrets Manager store.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, SdkError};
use aws_sdk_secretsmanager::Client;
use chrono::{DateTime, Utc};

use super::error::{Result, StoreError};
use super::store::SecretStore;
use super::types::{RandomValueSpec, SecretDescription, SecretString, SecretValue, VersionStage};

/// [`SecretStore`] backed by AWS Secrets Manager.
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerStore {
    client: Client,
}

impl AwsSecretsManagerStore {
    /// Build a client from the ambient AWS configuration, optionally
    /// pointing it at a specific endpoint.
    pub async fn from_env(endpoint: Option<&str>) -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            builder = builder.endpoint_url(endpoint);
        }
        Self { client: Client::from_conf(builder.build()) }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn store_error<E, R>(secret_id: &str, err: SdkError<E, R>, not_found: impl Fn(&E) -> bool) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StoreError::connection_failed(DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(service) if not_found(service.err()) => StoreError::not_found(secret_id),
        _ => StoreError::backend(DisplayErrorContext(&err).to_string()),
    }
}

fn to_chrono(date: &aws_sdk_secretsmanager::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), date.subsec_nanos())
}

#[async_trait]
impl SecretStore for AwsSecretsManagerStore {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue> {
        let out = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .version_stage(stage.label())
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| store_error(secret_id, e, |se| se.is_resource_not_found_exception()))?;

        Ok(SecretValue {
            value: SecretString::new(out.secret_string().unwrap_or_default()),
            version_id: out.version_id().map(str::to_string),
            created_at: out.created_date().and_then(to_chrono),
        })
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        stages: &[VersionStage],
        value: &SecretString,
    ) -> Result<()> {
        self.client
            .put_secret_value()
            .secret_id(secret_id)
            .set_client_request_token(version_id.map(str::to_string))
            .set_version_stages(Some(stages.iter().map(|s| s.label().to_string()).collect()))
            .secret_string(value.expose_secret())
            .send()
            .await
            .map_err(|e| store_error(secret_id, e, |se| se.is_resource_not_found_exception()))?;
        Ok(())
    }

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretDescription> {
        let out = self
            .client
            .describe_secret()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| store_error(secret_id, e, |se| se.is_resource_not_found_exception()))?;

        let version_to_stages: HashMap<String, Vec<VersionStage>> = out
            .version_ids_to_stages()
            .map(|versions| {
                versions
                    .iter()
                    .map(|(version, stages)| {
                        // Custom labels are not part of the rotation protocol.
                        let stages = stages.iter().filter_map(|s| s.parse().ok()).collect();
                        (version.clone(), stages)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SecretDescription { rotation_enabled: out.rotation_enabled().unwrap_or(false), version_to_stages })
    }

    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<()> {
        self.client
            .update_secret_version_stage()
            .secret_id(secret_id)
            .version_stage(stage.label())
            .move_to_version_id(move_to)
            .set_remove_from_version_id(remove_from.map(str::to_string))
            .send()
            .await
            .map_err(|e| store_error(secret_id, e, |se| se.is_resource_not_found_exception()))?;
        Ok(())
    }

    async fn generate_random_value(&self, spec: &RandomValueSpec) -> Result<SecretString> {
        let out = self
            .client
            .get_random_password()
            .password_length(spec.length as i64)
            .exclude_punctuation(spec.exclude_punctuation)
            .include_space(spec.include_space)
            .require_each_included_type(spec.require_each_class)
            .send()
            .await
            .map_err(|e| store_error("random password", e, |_| false))?;

        out.random_password()
            .map(SecretString::new)
            .ok_or_else(|| StoreError::backend("random password missing from response"))
    }
}
