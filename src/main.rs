use std::path::Path;
use std::sync::Arc;

use secure_lambda_url::{
    config::{ExtensionConfig, ObservabilityConfig},
    extension::{ExtensionClient, ExtensionRuntime, IpcServer, IpcState},
    observability::{init_logging, init_metrics, log_extension_config},
    secrets::{AwsSecretsManagerStore, DefaultAuthorizer, SecretCache},
    Result, APP_NAME, VERSION,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The Extensions API requires the registered name to match the file name.
fn extension_name() -> String {
    std::env::args()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "secure-lambda-url-extension".to_string())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = token.cancelled() => return,
    }

    info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let observability = ObservabilityConfig::from_env()?;
    init_logging(&observability)?;
    init_metrics(&observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting secure Lambda URL extension");

    let config = ExtensionConfig::from_env()?;
    log_extension_config(&config);

    let store = Arc::new(AwsSecretsManagerStore::from_env(Some(&config.secret_endpoint)).await);
    let cache = Arc::new(SecretCache::new(config.cache_ttl()));
    let authorizer = Arc::new(DefaultAuthorizer::new(store, cache.clone(), config.authorizer_config()));

    let server = IpcServer::new(
        config.bind_address(),
        IpcState::new(config.secret_arn.clone(), config.session_token.clone(), authorizer),
    );
    let client = ExtensionClient::new(&config.runtime_api);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    if let Err(e) = ExtensionRuntime::new(extension_name(), cache, server, client).run(shutdown).await {
        error!(error = %e, "Extension exiting with failure");
        std::process::exit(1);
    }

    info!("Extension shutdown completed");
    Ok(())
}
