//! Client for the Lambda Extensions API.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{Error, Result};

pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
pub const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterResponse {
    pub function_name: String,
    pub function_version: String,
    pub handler: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Invoke,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextEventResponse {
    pub event_type: EventType,
    #[serde(default)]
    pub deadline_ms: i64,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub invoked_function_arn: String,
    #[serde(default)]
    pub shutdown_reason: Option<String>,
}

/// Registers the extension and long-polls for lifecycle events.
pub struct ExtensionClient {
    http: reqwest::Client,
    base_url: String,
    extension_id: OnceLock<String>,
}

impl ExtensionClient {
    /// `runtime_api` is the `host:port` from `AWS_LAMBDA_RUNTIME_API`.
    pub fn new(runtime_api: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{}/2020-01-01/extension", runtime_api),
            extension_id: OnceLock::new(),
        }
    }

    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.get().map(String::as_str)
    }

    pub async fn register(&self, name: &str) -> Result<RegisterResponse> {
        let response = self
            .http
            .post(format!("{}/register", self.base_url))
            .header(EXTENSION_NAME_HEADER, name)
            .json(&json!({ "events": ["INVOKE", "SHUTDOWN"] }))
            .send()
            .await
            .map_err(|e| Error::transport(format!("Extension register request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!("Extension register failed with {}: {}", status, body)));
        }

        let id = response
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::transport("Extension register response is missing the extension identifier"))?
            .to_string();

        let registered = response
            .json::<RegisterResponse>()
            .await
            .map_err(|e| Error::transport(format!("Invalid register response: {}", e)))?;

        // A second registration keeps the first identifier.
        let _ = self.extension_id.set(id);
        tracing::info!(function_name = %registered.function_name, "Extension registered");
        Ok(registered)
    }

    /// Blocks until the next lifecycle event.
    pub async fn next_event(&self) -> Result<NextEventResponse> {
        let id = self.extension_id().ok_or_else(|| Error::transport("Extension is not registered"))?;

        let response = self
            .http
            .get(format!("{}/event/next", self.base_url))
            .header(EXTENSION_ID_HEADER, id)
            .send()
            .await
            .map_err(|e| Error::transport(format!("Next event request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!("Next event failed with {}: {}", status, body)));
        }

        response.json().await.map_err(|e| Error::transport(format!("Invalid event payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn registered_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2020-01-01/extension/register"))
            .and(header(EXTENSION_NAME_HEADER, "secure-lambda-url-extension"))
            .and(body_json(json!({ "events": ["INVOKE", "SHUTDOWN"] })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(EXTENSION_ID_HEADER, "ext-id-1")
                    .set_body_json(json!({
                        "functionName": "api",
                        "functionVersion": "$LATEST",
                        "handler": "bootstrap"
                    })),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_register_stores_identifier() {
        let server = registered_server().await;
        let client = ExtensionClient::new(&server.address().to_string());

        let response = client.register("secure-lambda-url-extension").await.unwrap();

        assert_eq!(response.function_name, "api");
        assert_eq!(response.function_version, "$LATEST");
        assert_eq!(client.extension_id(), Some("ext-id-1"));
    }

    #[tokio::test]
    async fn test_register_without_identifier_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2020-01-01/extension/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let client = ExtensionClient::new(&server.address().to_string());

        let err = client.register("ext").await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_register_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2020-01-01/extension/register"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let client = ExtensionClient::new(&server.address().to_string());

        let err = client.register("ext").await.unwrap_err();

        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_next_event_sends_identifier() {
        let server = registered_server().await;
        Mock::given(method("GET"))
            .and(path("/2020-01-01/extension/event/next"))
            .and(header(EXTENSION_ID_HEADER, "ext-id-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "eventType": "INVOKE",
                "deadlineMs": 1700000000000i64,
                "requestId": "req-1",
                "invokedFunctionArn": "arn:aws:lambda:eu-west-1:123456789012:function:api",
                "tracing": { "type": "X-Amzn-Trace-Id", "value": "Root=1-abc" }
            })))
            .mount(&server)
            .await;
        let client = ExtensionClient::new(&server.address().to_string());
        client.register("secure-lambda-url-extension").await.unwrap();

        let event = client.next_event().await.unwrap();

        assert_eq!(event.event_type, EventType::Invoke);
        assert_eq!(event.request_id, "req-1");
        assert!(event.shutdown_reason.is_none());
    }

    #[tokio::test]
    async fn test_next_event_requires_registration() {
        let client = ExtensionClient::new("127.0.0.1:9");
        assert!(matches!(client.next_event().await, Err(Error::Transport(_))));
    }
}
