use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use secure_lambda_url::{
    config::{ObservabilityConfig, RotationConfig},
    distribution::CloudFrontUpdater,
    observability::{flush_metrics, init_logging, init_metrics, log_rotation_config},
    rotation::{RotationHandler, RotationRequest},
    secrets::{AwsSecretsManagerStore, DefaultRotator},
    APP_NAME, VERSION,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let observability = ObservabilityConfig::from_env()?;
    init_logging(&observability)?;
    init_metrics(&observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting secure Lambda URL rotation function");

    let config = RotationConfig::from_env()?;
    log_rotation_config(&config);

    let store = Arc::new(AwsSecretsManagerStore::from_env(Some(&config.secrets_manager_endpoint)).await);
    let updater = Arc::new(CloudFrontUpdater::from_env().await);
    let handler = Arc::new(RotationHandler::new(
        Arc::new(DefaultRotator::new(store)),
        updater,
        config.distribution_target(),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<RotationRequest>| {
        let handler = handler.clone();
        async move {
            let result = handler.handle(event.payload).await;
            flush_metrics();
            result.map_err(Error::from)
        }
    }))
    .await
}
