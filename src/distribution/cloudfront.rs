//! CloudFront-backed distribution updater.
//!
//! Only origin custom header values are carried back into the CloudFront
//! configuration; everything else is written back exactly as it was read.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::DistributionConfig as CfDistributionConfig;
use aws_sdk_cloudfront::Client;

use super::{ConfigMutator, CustomHeader, DistributionConfig, DistributionError, DistributionUpdater, Origin, Result};

#[derive(Debug, Clone)]
pub struct CloudFrontUpdater {
    client: Client,
}

impl CloudFrontUpdater {
    pub async fn from_env() -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self { client: Client::new(&shared) }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_raw(&self, distribution_id: &str) -> Result<(CfDistributionConfig, Option<String>)> {
        let out = self.client.get_distribution_config().id(distribution_id).send().await.map_err(|e| {
            match e.as_service_error() {
                Some(se) if se.is_no_such_distribution() => DistributionError::not_found(distribution_id),
                _ => DistributionError::backend(DisplayErrorContext(&e).to_string()),
            }
        })?;

        let config = out
            .distribution_config
            .ok_or_else(|| DistributionError::backend("distribution config missing from response"))?;
        Ok((config, out.e_tag))
    }
}

fn project(config: &CfDistributionConfig) -> DistributionConfig {
    let origins = config
        .origins
        .as_ref()
        .map(|origins| {
            origins
                .items
                .iter()
                .map(|origin| Origin {
                    id: origin.id.clone(),
                    domain_name: origin.domain_name.clone(),
                    custom_headers: origin
                        .custom_headers
                        .as_ref()
                        .and_then(|h| h.items.as_ref())
                        .map(|items| {
                            items.iter().map(|h| CustomHeader::new(&h.header_name, &h.header_value)).collect()
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    DistributionConfig { origins }
}

fn write_back(model: &DistributionConfig, config: &mut CfDistributionConfig) {
    let Some(origins) = config.origins.as_mut() else {
        return;
    };
    for origin in origins.items.iter_mut() {
        let Some(edited) = model.origins.iter().find(|o| o.id == origin.id) else {
            continue;
        };
        let Some(items) = origin.custom_headers.as_mut().and_then(|h| h.items.as_mut()) else {
            continue;
        };
        for header in items.iter_mut() {
            if let Some(value) = edited.custom_headers.iter().find(|h| h.name == header.header_name) {
                header.header_value = value.value.clone();
            }
        }
    }
}

#[async_trait]
impl DistributionUpdater for CloudFrontUpdater {
    async fn fetch(&self, distribution_id: &str) -> Result<DistributionConfig> {
        let (config, _) = self.fetch_raw(distribution_id).await?;
        Ok(project(&config))
    }

    async fn update(&self, distribution_id: &str, mutators: Vec<ConfigMutator>) -> Result<()> {
        if mutators.is_empty() {
            return Err(DistributionError::NoMutators);
        }

        let (mut config, etag) = self.fetch_raw(distribution_id).await?;
        let mut model = project(&config);
        for mutate in &mutators {
            mutate(&mut model);
        }
        write_back(&model, &mut config);

        self.client
            .update_distribution()
            .id(distribution_id)
            .set_if_match(etag)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_precondition_failed() => DistributionError::precondition_failed(distribution_id),
                Some(se) if se.is_no_such_distribution() => DistributionError::not_found(distribution_id),
                _ => DistributionError::backend(DisplayErrorContext(&e).to_string()),
            })?;

        tracing::info!(distribution_id = %distribution_id, "Updated distribution configuration");
        Ok(())
    }
}
