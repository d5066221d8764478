//! crates/know_flow_client/src/client.rs
//!
//! The HTTP core: one `request` call per logical operation, with a per-attempt
//! timeout and a flat-delay retry for transient failures.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Per-call overrides for [`ApiClient::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides [`ClientConfig::timeout`] for this call.
    pub timeout: Option<Duration>,
    /// Overrides [`ClientConfig::retry_attempts`] for this call.
    pub retry_attempts: Option<u32>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn post<T: Serialize>(body: &T) -> Result<Self, ClientError> {
        Self::method(Method::POST).json(body)
    }

    pub fn put<T: Serialize>(body: &T) -> Result<Self, ClientError> {
        Self::method(Method::PUT).json(body)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        let value =
            serde_json::to_value(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }
}

/// Client for the Know-Flow REST API.
///
/// The acting user's id is injected with [`ApiClient::with_identity`] and sent as a
/// bearer token on every call.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    identity: Option<String>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            http,
            config,
            identity: None,
        })
    }

    /// Builds a client from `KNOW_FLOW_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        let config =
            ClientConfig::from_env().map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Self::new(config)
    }

    pub fn with_identity(mut self, uid: impl Into<String>) -> Self {
        self.identity = Some(uid.into());
        self
    }

    pub fn set_identity(&mut self, uid: Option<String>) {
        self.identity = uid;
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Performs one logical request and returns the parsed JSON body.
    ///
    /// A retryable failure is attempted again after `retry_delay`, up to
    /// `retry_attempts` more times. Non-retryable failures return immediately.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ClientError> {
        let url = self.url(endpoint);
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let max_retries = options.retry_attempts.unwrap_or(self.config.retry_attempts);

        let mut attempt: u32 = 0;
        loop {
            debug!(method = %options.method, %url, attempt, "Sending API request");
            match self.send_once(&url, &options, timeout).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    attempt += 1;
                    warn!(
                        %url,
                        attempt,
                        max_retries,
                        delay_ms = self.config.retry_delay.as_millis() as u64,
                        error = %e,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    debug!(%url, attempt, error = %e, "API request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let mut builder = self
            .http
            .request(options.method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(uid) = &self.identity {
            builder = builder.bearer_auth(uid);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        // The deadline covers connecting, sending and reading the whole body.
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, ClientError>((status, text))
        };
        let (status, text) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout)??;

        let body = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(e) if status.is_success() => {
                    return Err(ClientError::InvalidResponse(e.to_string()))
                }
                Err(_) => None,
            }
        };

        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), body.as_ref()));
        }
        Ok(body.unwrap_or(Value::Null))
    }
}
