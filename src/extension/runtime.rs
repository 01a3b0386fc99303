//! Extension lifecycle: cache janitor, authorization server and the
//! Extensions API event loop, tied together by one cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::client::{EventType, ExtensionClient};
use super::ipc::IpcServer;
use crate::errors::{Error, Result};
use crate::observability::{flush_metrics, MetricsRecorder};
use crate::secrets::SecretCache;

/// Head start given to the server before registering, so the runtime does
/// not route an invocation to a port nobody listens on yet.
const SERVER_STARTUP_DELAY: Duration = Duration::from_millis(10);

pub struct ExtensionRuntime {
    name: String,
    cache: Arc<SecretCache>,
    server: IpcServer,
    client: ExtensionClient,
}

impl ExtensionRuntime {
    pub fn new(name: impl Into<String>, cache: Arc<SecretCache>, server: IpcServer, client: ExtensionClient) -> Self {
        Self { name: name.into(), cache, server, client }
    }

    /// Run until a SHUTDOWN event, a failure of either the server or the
    /// event loop, or `shutdown` firing. Returns the first error.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let Self { name, cache, server, client } = self;

        let metrics = MetricsRecorder::new();
        let janitor = cache.run(
            shutdown.clone(),
            Some(Box::new(move || {
                metrics.record_cache_clear();
                info!("Secret cache cleared");
            })),
        );

        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            let result = server.start(server_shutdown.clone()).await;
            server_shutdown.cancel();
            result
        });

        tokio::time::sleep(SERVER_STARTUP_DELAY).await;

        let events = match client.register(&name).await {
            Ok(_) => process_events(&client, &shutdown).await,
            Err(e) => Err(e),
        };
        shutdown.cancel();

        let served = server.await.map_err(|e| Error::internal(format!("Authorization server task failed: {}", e)))?;
        join_janitor(janitor).await;
        flush_metrics();

        events.and(served)
    }
}

/// Wait for the janitor's terminal clear. A janitor that died is logged,
/// not returned.
async fn join_janitor(janitor: Option<JoinHandle<()>>) -> bool {
    let Some(janitor) = janitor else {
        return true;
    };
    match janitor.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Secret cache janitor task failed");
            false
        }
    }
}

async fn process_events(client: &ExtensionClient, shutdown: &CancellationToken) -> Result<()> {
    loop {
        debug!("Waiting for event");
        let event = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            event = client.next_event() => event?,
        };

        match event.event_type {
            EventType::Shutdown => {
                info!(reason = ?event.shutdown_reason, "Received SHUTDOWN event");
                return Ok(());
            }
            EventType::Invoke => debug!(request_id = %event.request_id, "Received INVOKE event"),
        }
        flush_metrics();
    }
}
