//! Outbound HTTP abstraction used by the sensor providers.
//!
//! Providers never talk to `reqwest` directly; they build an [`ApiRequest`]
//! and hand it to a [`SensorHttpClient`]. Callers can swap in their own
//! transport (custom proxies, retries, test doubles) at construction time.

pub mod reqwest_client;

pub use reqwest_client::ReqwestSensorHttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use thiserror::Error;
use url::Url;

/// Contract for sending a single request and receiving status + body.
///
/// Implementations must be reusable across calls and safe to share between
/// tasks; no per-call connection state is expected to survive.
#[async_trait]
pub trait SensorHttpClient: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Request description handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn post(url: Url) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Minimal response representation returned by the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Reason phrase for the status code, eg. `Not Found`.
    pub fn reason(&self) -> String {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or_default()
            .to_string()
    }
}
