//! Reqwest-based implementation of the `SensorHttpClient` trait.
//!
//! Thin adapter around `reqwest::Client` converting between the transport
//! types used by the providers and the concrete client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, header::HeaderMap};

use super::{ApiRequest, ApiResponse, SensorHttpClient, TransportError};

/// Default transport used when no client is injected.
#[derive(Debug, Clone)]
pub struct ReqwestSensorHttpClient {
    client: Client,
}

impl ReqwestSensorHttpClient {
    pub fn new() -> Result<Self, TransportError> {
        Self::build(None)
    }

    /// Creates a client whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(Some(timeout))
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn build(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SensorHttpClient for ReqwestSensorHttpClient {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|err| TransportError::Request(err.to_string()))?;
        let headers = convert_headers(&request.headers)?;

        let response = self
            .client
            .request(method, request.url.as_str())
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Body(err.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}

fn convert_headers(headers: &http::HeaderMap) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

type _AssertSync = Arc<ReqwestSensorHttpClient>;
