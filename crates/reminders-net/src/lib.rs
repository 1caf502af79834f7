//! # Reminders Net
//!
//! HTTP implementation of the worker's [`Network`] service, backed by
//! `reqwest`. The worker only ever sees [`FetchRequest`] and
//! [`FetchResponse`]; this crate maps them onto real requests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderName, HeaderValue, Method};
use reminders_common::RelayError;
use reminders_sw::{FetchRequest, FetchResponse, Network, SwError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<NetError> for SwError {
    fn from(err: NetError) -> Self {
        SwError::Network(err.to_string())
    }
}

impl From<NetError> for RelayError {
    fn from(err: NetError) -> Self {
        RelayError::network(err.to_string())
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// User agent string.
    pub user_agent: String,
    /// Per-request timeout. `None` waits indefinitely, like a page fetch.
    pub timeout_ms: Option<u64>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            user_agent: "SimpleReminders-Worker/0.1".to_string(),
            timeout_ms: None,
        }
    }
}

impl NetConfig {
    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// [`Network`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
    config: NetConfig,
}

impl HttpNetwork {
    pub fn new(config: NetConfig) -> Result<Self, NetError> {
        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(user_agent = %config.user_agent, "HttpNetwork initialized");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Perform the request and buffer the whole body.
    pub async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, NetError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| NetError::InvalidMethod(request.method.clone()))?;
        debug!(url = %request.url, %method, "Fetching");

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(n), Ok(v)) => builder = builder.header(n, v),
                _ => warn!(header = %name, "Skipping invalid request header"),
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        let body: Bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        trace!(
            url = %request.url,
            status = status.as_u16(),
            body_len = body.len(),
            "Response received"
        );

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            from_cache: false,
        })
    }

    fn classify(&self, err: reqwest::Error) -> NetError {
        match self.config.timeout() {
            Some(limit) if err.is_timeout() => NetError::Timeout(limit),
            _ => NetError::HttpError(err),
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, SwError> {
        Ok(self.send(request).await?)
    }
}
