//! HTTP implementation of [`RemoteApi`]
//!
//! Create → `POST {base}/api/{collection}`,
//! Update → `PUT {base}/api/{collection}/{id}`,
//! Delete → `DELETE {base}/api/{collection}/{id}`.

use super::{RemoteApi, RemoteError};
use crate::shared::error::{Result, SyncError};
use crate::shared::records::{EntityKind, Operation};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// REST client for the practice API
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemoteApi {
    /// Build a client; every request carries `timeout`
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// URL of a single record; the id is percent-encoded as one path segment
    fn record_url(&self, kind: EntityKind, payload: &serde_json::Value) -> std::result::Result<Url, RemoteError> {
        let id = payload
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| RemoteError::Permanent("payload has no record id".to_string()))?;

        let mut url = Url::parse(&self.api_url(&format!("/{}", kind.collection())))
            .map_err(|e| RemoteError::Permanent(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Permanent("base URL cannot carry a path".to_string()))?
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn apply(
        &self,
        entity_kind: EntityKind,
        operation: Operation,
        payload: &serde_json::Value,
    ) -> std::result::Result<(), RemoteError> {
        let mut request = match operation {
            Operation::Create => self
                .client
                .post(self.api_url(&format!("/{}", entity_kind.collection())))
                .json(payload),
            Operation::Update => self.client.put(self.record_url(entity_kind, payload)?).json(payload),
            Operation::Delete => self.client.delete(self.record_url(entity_kind, payload)?),
        };

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();

        if status.is_success() || (operation == Operation::Delete && status == StatusCode::NOT_FOUND) {
            tracing::debug!(kind = %entity_kind, %operation, %status, "Remote applied mutation");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{} - {}", status, body)
        };

        Err(classify_status(status, message))
    }
}

/// Map a non-success status to a retry decision
///
/// Auth failures (401/403) count as transient and keep spending retry budget.
fn classify_status(status: StatusCode, message: String) -> RemoteError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status.is_server_error()
    {
        RemoteError::Transient(message)
    } else {
        RemoteError::Permanent(message)
    }
}

fn classify_send_error(err: reqwest::Error) -> RemoteError {
    if err.is_builder() {
        RemoteError::Permanent(format!("invalid request: {}", err))
    } else if err.is_timeout() {
        RemoteError::Transient(format!("request timed out: {}", err))
    } else {
        RemoteError::Transient(format!("network error: {}", err))
    }
}
