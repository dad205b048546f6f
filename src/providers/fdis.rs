//! FDIS sensor API.
//!
//! JSON in, JSON out. Dynamic scripts are handled vendor-side: the request
//! only carries a flag and the MD5 of the script body.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{
    ProviderError, ProviderErrorKind, ProviderKind, ScriptState, SensorProvider, decode_json,
    default_client, dispatch, json_request, second_generation,
};
use crate::config::ApiConfig;
use crate::transport::SensorHttpClient;

const GENERATE_WEB_SENSOR_ENDPOINT: &str = "https://akamai.fdisservices.co/v2/web";

#[derive(Debug, Serialize)]
struct GenerateWebSensorRequest<'a> {
    url: &'a str,
    abck: &'a str,
    #[serde(rename = "bm_sz", skip_serializing_if = "str::is_empty")]
    bmsz: &'a str,
    #[serde(rename = "scriptUrl")]
    script_url: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(rename = "userAgent")]
    user_agent: &'a str,
    keyboard: bool,
    dynamic: bool,
    #[serde(rename = "dynamicHash", skip_serializing_if = "str::is_empty")]
    dynamic_hash: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    error: String,
    sensor: String,
}

/// Adapter for the FDIS web sensor endpoint.
pub struct FdisProvider {
    config: Arc<ApiConfig>,
    client: Arc<dyn SensorHttpClient>,
    script: ScriptState,
}

impl FdisProvider {
    const KIND: ProviderKind = ProviderKind::Fdis;

    /// Creates a provider backed by the default reqwest transport.
    pub fn new(config: Arc<ApiConfig>) -> Result<Self, ProviderError> {
        Ok(Self::with_client(config, default_client(Self::KIND)?))
    }

    /// Creates a provider sending its requests through `client`.
    pub fn with_client(config: Arc<ApiConfig>, client: Arc<dyn SensorHttpClient>) -> Self {
        Self {
            config,
            client,
            script: ScriptState::default(),
        }
    }

    /// Script URL, body and fingerprint from the last successful update.
    pub fn script(&self) -> &ScriptState {
        &self.script
    }

    async fn request_sensor(
        &self,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderErrorKind> {
        let bmsz = second_generation(bmsz);
        let payload = GenerateWebSensorRequest {
            url: &self.config.site,
            abck,
            bmsz: bmsz.unwrap_or_default(),
            script_url: self.script.url(),
            kind: if bmsz.is_some() { 2 } else { 1 },
            user_agent: &self.config.user_agent,
            keyboard: false,
            dynamic: self.config.dynamic,
            dynamic_hash: if self.config.dynamic {
                self.script.fingerprint()
            } else {
                ""
            },
        };

        let request = json_request(
            GENERATE_WEB_SENSOR_ENDPOINT,
            &[
                ("content-type", "application/json"),
                ("x-api-key", self.config.api_key.as_str()),
            ],
            &payload,
        )?;
        let body = dispatch(self.client.as_ref(), Self::KIND, request).await?;

        let response: ApiResponse = decode_json(&body)?;
        if !response.error.is_empty() {
            return Err(ProviderErrorKind::Api(response.error));
        }

        Ok(response.sensor)
    }
}

#[async_trait]
impl SensorProvider for FdisProvider {
    fn kind(&self) -> ProviderKind {
        Self::KIND
    }

    async fn generate_web_sensor(
        &self,
        _iteration: u32,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.request_sensor(abck, bmsz)
            .await
            .map_err(|kind| ProviderError::new(Self::KIND, kind))
    }

    fn set_script_url(&mut self, url: &str) {
        self.script.set_url(url);
    }

    async fn set_script_body(&mut self, body: Bytes) -> Result<(), ProviderError> {
        let fingerprint = format!("{:x}", md5::compute(&body));
        self.script.replace_body(body, fingerprint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{SITE, StubClient, USER_AGENT, config};
    use crate::transport::{ApiResponse as RawResponse, TransportError};

    fn provider(dynamic: bool, client: Arc<StubClient>) -> FdisProvider {
        FdisProvider::with_client(config(dynamic), client)
    }

    #[tokio::test]
    async fn first_generation_request_shape() {
        let client = Arc::new(StubClient::ok(&[r#"{"error":"","sensor":"2;0;sensor"}"#]));
        let mut provider = provider(false, client.clone());
        provider.set_script_url("https://www.example.com/akam/13/abc");

        let sensor = provider.generate_web_sensor(0, "abck-value", None).await.unwrap();
        assert_eq!(sensor, "2;0;sensor");

        let requests = client.requests();
        assert_eq!(requests[0].url.as_str(), GENERATE_WEB_SENSOR_ENDPOINT);
        assert_eq!(requests[0].headers["x-api-key"], "test-key");
        assert_eq!(requests[0].content_type(), Some("application/json"));

        let body = client.json_body(0);
        assert_eq!(body["type"], 1);
        assert_eq!(body["url"], SITE);
        assert_eq!(body["userAgent"], USER_AGENT);
        assert_eq!(body["scriptUrl"], "https://www.example.com/akam/13/abc");
        assert_eq!(body["keyboard"], false);
        assert_eq!(body["dynamic"], false);
        assert!(body.get("bm_sz").is_none());
        assert!(body.get("dynamicHash").is_none());
    }

    #[tokio::test]
    async fn second_generation_cookie_raises_type() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"sensor":"s"}"#,
            r#"{"sensor":"s"}"#,
        ]));
        let provider = provider(false, client.clone());

        provider
            .generate_web_sensor(0, "abck", Some("bmsz-value"))
            .await
            .unwrap();
        provider.generate_web_sensor(0, "abck", Some("")).await.unwrap();

        let second = client.json_body(0);
        assert_eq!(second["type"], 2);
        assert_eq!(second["bm_sz"], "bmsz-value");

        let first = client.json_body(1);
        assert_eq!(first["type"], 1);
        assert!(first.get("bm_sz").is_none());
    }

    #[tokio::test]
    async fn dynamic_mode_sends_md5_of_script() {
        let client = Arc::new(StubClient::ok(&[r#"{"sensor":"s"}"#]));
        let mut provider = provider(true, client.clone());
        provider
            .set_script_body(Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(
            provider.script().fingerprint(),
            "5d41402abc4b2a76b9719d911017c592"
        );

        provider.generate_web_sensor(3, "abck", None).await.unwrap();
        let body = client.json_body(0);
        assert_eq!(body["dynamic"], true);
        assert_eq!(body["dynamicHash"], "5d41402abc4b2a76b9719d911017c592");
    }

    #[tokio::test]
    async fn error_field_fails_even_on_200() {
        let client = Arc::new(StubClient::ok(&[r#"{"error":"invalid key","sensor":""}"#]));
        let provider = provider(false, client);

        let err = provider.generate_web_sensor(0, "abck", None).await.unwrap_err();
        assert_eq!(err.provider, ProviderKind::Fdis);
        assert!(matches!(err.kind, ProviderErrorKind::Api(ref message) if message == "invalid key"));
    }

    #[tokio::test]
    async fn non_200_is_not_parsed() {
        let client = Arc::new(StubClient::new(vec![Ok(RawResponse::new(
            401,
            r#"{"error":"should not be read"}"#,
        ))]));
        let provider = provider(false, client);

        let err = provider.generate_web_sensor(0, "abck", None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.to_string(), "fdis: 401 Unauthorized");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let client = Arc::new(StubClient::ok(&["<html>gateway</html>"]));
        let provider = provider(false, client);

        let err = provider.generate_web_sensor(0, "abck", None).await.unwrap_err();
        assert!(matches!(err.kind, ProviderErrorKind::Decode(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_distinguishable() {
        let client = Arc::new(StubClient::new(vec![Err(TransportError::Request(
            "connection refused".into(),
        ))]));
        let provider = provider(false, client);

        let err = provider.generate_web_sensor(0, "abck", None).await.unwrap_err();
        assert!(err.is_transport());
    }
}
