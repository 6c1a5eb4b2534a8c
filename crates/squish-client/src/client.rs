//! The squish HTTP client.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ClientError;
use crate::types::{CheckOperation, JobInfo, Operation, UsageStats};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the squish API.
#[derive(Debug, Clone)]
pub struct SquishClient {
    base_url: String,
    http: reqwest::Client,
    api_key: Option<String>,
    session_id: Option<String>,
}

impl SquishClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the base URL is empty or the
    /// HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base URL must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            api_key: None,
            session_id: None,
        })
    }

    /// Attach an API key for tier-gated endpoints.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Attach a session ID for the session surface.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }
        if let Some(session) = &self.session_id {
            builder = builder.header("x-session-id", session);
        }
        builder
    }

    /// `GET /api/usage-stats`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server denies it.
    pub async fn usage_stats(&self, plan: Option<&str>) -> Result<UsageStats, ClientError> {
        let mut builder = self.request(reqwest::Method::GET, "/api/usage-stats");
        if let Some(plan) = plan {
            builder = builder.query(&[("planId", plan)]);
        }
        Self::handle(builder.send().await?).await
    }

    /// `GET /api/universal-usage-stats`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server denies it.
    pub async fn universal_usage_stats(
        &self,
        page: Option<&str>,
    ) -> Result<UsageStats, ClientError> {
        let mut builder = self.request(reqwest::Method::GET, "/api/universal-usage-stats");
        if let Some(page) = page {
            builder = builder.query(&[("pageId", page)]);
        }
        Self::handle(builder.send().await?).await
    }

    /// `POST /api/check-operation`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server denies it.
    pub async fn check_operation(
        &self,
        filename: &str,
        file_size: u64,
        page: Option<&str>,
    ) -> Result<CheckOperation, ClientError> {
        let mut body = json!({
            "filename": filename,
            "fileSize": file_size,
        });
        if let Some(page) = page {
            body["pageIdentifier"] = json!(page);
        }

        let builder = self
            .request(reqwest::Method::POST, "/api/check-operation")
            .json(&body);
        Self::handle(builder.send().await?).await
    }

    /// `POST /v1/operations`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server denies it, or the
    /// quota is exhausted (`ClientError::QuotaExceeded`).
    pub async fn submit_operation(
        &self,
        file_id: &str,
        operation: Operation,
        target_format: Option<&str>,
    ) -> Result<JobInfo, ClientError> {
        let mut body = json!({
            "file_id": file_id,
            "operation": operation,
        });
        if let Some(target) = target_format {
            body["target_format"] = json!(target);
        }

        let builder = self
            .request(reqwest::Method::POST, "/v1/operations")
            .json(&body);
        Self::handle(builder.send().await?).await
    }

    /// Deserialize a success body or map the error envelope.
    async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let status_code = status.as_u16();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let code = body["error"]["code"].as_str().unwrap_or("unknown").to_string();
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();

        tracing::debug!(status = status_code, code = %code, "API request failed");

        if code == "quota_exceeded" {
            return Err(ClientError::QuotaExceeded {
                reason: message,
                upgrade_required: body["error"]["details"]["upgrade_required"]
                    .as_str()
                    .map(String::from),
            });
        }

        Err(ClientError::Api {
            code,
            message,
            status: status_code,
        })
    }
}
