//! Loopback authorization endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::secrets::{AuthError, Authorizer, SecretString};

/// Header carrying the caller's session token.
pub const TOKEN_HEADER: &str = "X-Aws-Token";

#[derive(Clone)]
pub struct IpcState {
    secret_id: Arc<str>,
    session_token: Arc<SecretString>,
    authorizer: Arc<dyn Authorizer>,
    metrics: MetricsRecorder,
}

impl IpcState {
    pub fn new(
        secret_id: impl Into<String>,
        session_token: impl Into<SecretString>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            secret_id: Arc::from(secret_id.into()),
            session_token: Arc::new(session_token.into()),
            authorizer,
            metrics: MetricsRecorder::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    #[serde(default)]
    key: String,
}

fn bad_request(metrics: &MetricsRecorder) -> Response {
    metrics.record_bad_request();
    (StatusCode::BAD_REQUEST, "bad request").into_response()
}

/// Every path and method lands here so that anything other than `GET /`
/// answers 400 rather than 404 or 405.
#[instrument(skip_all, fields(method = %method, path = %uri.path()))]
async fn authorize(
    State(state): State<IpcState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Response {
    if method != Method::GET || uri.path() != "/" {
        return bad_request(&state.metrics);
    }

    let token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !state.session_token.matches(token) {
        return bad_request(&state.metrics);
    }

    let outcome = state.authorizer.authorize(&state.secret_id, query.key.trim()).await;
    if outcome.used_remote_call {
        state.metrics.record_secret_request();
    }

    match outcome.result {
        Ok(()) => {
            state.metrics.record_authorized();
            StatusCode::OK.into_response()
        }
        Err(AuthError::Unauthorized) => {
            state.metrics.record_unauthorized();
            (StatusCode::UNAUTHORIZED, AuthError::Unauthorized.to_string()).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Authorization request failed");
            state.metrics.record_internal_error();
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn router(state: IpcState) -> Router {
    Router::new().fallback(authorize).with_state(state)
}

pub struct IpcServer {
    addr: SocketAddr,
    router: Router,
}

impl IpcServer {
    pub fn new(addr: SocketAddr, state: IpcState) -> Self {
        Self { addr, router: router(state) }
    }

    /// Bind and serve until `shutdown` fires. A cancelled server returns Ok.
    pub async fn start(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::transport(format!("Failed to bind authorization server: {}", e)))?;
        serve(listener, self.router, shutdown).await
    }
}

pub async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "Starting authorization server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::transport(format!("Authorization server error: {}", e)))?;

    info!("Authorization server shutdown completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{Authorization, StoreError};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const SECRET: &str = "arn:aws:secretsmanager:eu-west-1:123456789012:secret/key";

    /// Authorizer that accepts "good", fails on "boom" and rejects the rest.
    #[derive(Default)]
    struct StubAuthorizer {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Authorizer for StubAuthorizer {
        async fn authorize(&self, secret_id: &str, presented: &str) -> Authorization {
            self.seen.lock().unwrap().push((secret_id.to_string(), presented.to_string()));
            let result = match presented {
                "good" => Ok(()),
                "boom" => Err(AuthError::AuthorizationFailed(StoreError::connection_failed("timeout"))),
                "" => Err(AuthError::InvalidInput),
                _ => Err(AuthError::Unauthorized),
            };
            Authorization { result, used_remote_call: true }
        }
    }

    fn app() -> (Router, Arc<StubAuthorizer>) {
        let authorizer = Arc::new(StubAuthorizer::default());
        (router(IpcState::new(SECRET, "session", authorizer.clone())), authorizer)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).header(TOKEN_HEADER, "session").body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_authorized_key() {
        let (app, authorizer) = app();

        let response = app.oneshot(get("/?key=%20good%20")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(authorizer.seen.lock().unwrap().as_slice(), &[(SECRET.to_string(), "good".to_string())]);
    }

    #[tokio::test]
    async fn test_unauthorized_key() {
        let (app, _) = app();

        let response = app.oneshot(get("/?key=bad")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(response).await, "unauthorized");
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let (app, _) = app();

        let response = app.oneshot(get("/?key=boom")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("authorization failed"));
    }

    #[tokio::test]
    async fn test_missing_key_is_internal_error() {
        let (app, _) = app();

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "invalid secret value");
    }

    #[tokio::test]
    async fn test_wrong_token_is_bad_request() {
        let (app, authorizer) = app();
        let request =
            Request::builder().uri("/?key=good").header(TOKEN_HEADER, "other").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "bad request");
        assert!(authorizer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_is_bad_request() {
        let (app, _) = app();
        let request = Request::builder().uri("/?key=good").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_method_or_path_is_bad_request() {
        let (app, _) = app();
        let post = Request::builder()
            .method(Method::POST)
            .uri("/?key=good")
            .header(TOKEN_HEADER, "session")
            .body(Body::empty())
            .unwrap();

        let response = app.clone().oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/authorize?key=good")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_server_stops_on_cancellation() {
        let (app, _) = app();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(serve(listener, app, shutdown.clone()));
        shutdown.cancel();

        assert!(handle.await.unwrap().is_ok());
    }
}
