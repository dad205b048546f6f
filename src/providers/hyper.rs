//! Hyper Solutions sensor API.
//!
//! Every response uses the same `{ errorMessage, payload }` envelope. The
//! script fingerprint is a SHA-256 digest: it is sent with each sensor request
//! and used as the cache key when resolving dynamic script configs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    DynamicConfig, ProviderError, ProviderErrorKind, ProviderKind, ScriptState, SensorProvider,
    decode_json, default_client, dispatch, json_request, non_empty_config, second_generation,
};
use crate::config::ApiConfig;
use crate::transport::SensorHttpClient;

const GENERATE_WEB_SENSOR_ENDPOINT: &str = "https://akm.justhyped.dev/sensor";
const SCRIPT_CONFIG_ENDPOINT: &str = "https://akm.justhyped.dev/dynamic";
/// Assumed cache lookup route next to `/dynamic`; not a confirmed vendor
/// endpoint. A non-200 answer here fails dynamic resolution.
const SCRIPT_CONFIG_CACHE_ENDPOINT: &str = "https://akm.justhyped.dev/dynamic/cache";

const CACHE_MISS: &str = "false";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateWebSensorRequest<'a> {
    user_agent: &'a str,
    page_url: &'a str,
    version: &'a str,
    abck: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    bmsz: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    script_hash: &'a str,
    #[serde(rename = "dynamicValues", skip_serializing_if = "str::is_empty")]
    config: &'a str,
}

#[derive(Debug, Serialize)]
struct CacheLookupRequest<'a> {
    hash: &'a str,
}

#[derive(Debug, Serialize)]
struct ComputeConfigRequest<'a> {
    script: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiResponse {
    error_message: String,
    payload: String,
}

impl ApiResponse {
    fn into_payload(self) -> Result<String, ProviderErrorKind> {
        if !self.error_message.is_empty() {
            return Err(ProviderErrorKind::Api(self.error_message));
        }
        Ok(self.payload)
    }
}

/// Adapter for the Hyper Solutions sensor and dynamic script endpoints.
pub struct HyperProvider {
    config: Arc<ApiConfig>,
    client: Arc<dyn SensorHttpClient>,
    script: ScriptState,
    dynamic_config: DynamicConfig,
}

impl HyperProvider {
    const KIND: ProviderKind = ProviderKind::Hyper;

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
            dynamic_config: DynamicConfig::default(),
        }
    }

    /// Script URL, body and fingerprint from the last successful update.
    pub fn script(&self) -> &ScriptState {
        &self.script
    }

    /// Configuration resolved for the current script body.
    pub fn dynamic_config(&self) -> &DynamicConfig {
        &self.dynamic_config
    }

    async fn call<T: Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<String, ProviderErrorKind> {
        let request = json_request(
            endpoint,
            &[
                ("content-type", "application/json"),
                ("x-api-key", self.config.api_key.as_str()),
            ],
            payload,
        )?;
        let body = dispatch(self.client.as_ref(), Self::KIND, request).await?;
        decode_json::<ApiResponse>(&body)?.into_payload()
    }

    async fn request_sensor(
        &self,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderErrorKind> {
        let dynamic_config = if self.config.dynamic {
            self.dynamic_config.current()?.unwrap_or_default()
        } else {
            ""
        };
        let bmsz = second_generation(bmsz);

        let payload = GenerateWebSensorRequest {
            user_agent: &self.config.user_agent,
            page_url: &self.config.site,
            version: if bmsz.is_some() { "2" } else { "1" },
            abck,
            bmsz: bmsz.unwrap_or_default(),
            script_hash: self.script.fingerprint(),
            config: dynamic_config,
        };

        self.call(GENERATE_WEB_SENSOR_ENDPOINT, &payload).await
    }

    async fn resolve_dynamic_config(
        &self,
        script: &[u8],
        fingerprint: &str,
    ) -> Result<String, ProviderErrorKind> {
        let cached = self
            .call(
                SCRIPT_CONFIG_CACHE_ENDPOINT,
                &CacheLookupRequest { hash: fingerprint },
            )
            .await?;

        if !cached.is_empty() && cached != CACHE_MISS {
            log::info!("{}: dynamic script config served from cache", Self::KIND);
            return Ok(cached);
        }

        let script_text = String::from_utf8_lossy(script);
        let computed = non_empty_config(
            self.call(
                SCRIPT_CONFIG_ENDPOINT,
                &ComputeConfigRequest {
                    script: &script_text,
                },
            )
            .await?,
        )?;

        log::info!("{}: dynamic script config computed", Self::KIND);
        Ok(computed)
    }
}

#[async_trait]
impl SensorProvider for HyperProvider {
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
        let fingerprint = hex::encode(Sha256::digest(&body));

        if self.config.dynamic {
            match self.resolve_dynamic_config(&body, &fingerprint).await {
                Ok(blob) => self.dynamic_config = DynamicConfig::Resolved(blob),
                Err(kind) => {
                    log::warn!("{}: failed to resolve dynamic script config: {kind}", Self::KIND);
                    self.dynamic_config.mark_stale();
                    return Err(ProviderError::new(Self::KIND, kind));
                }
            }
        }

        self.script.replace_body(body, fingerprint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{SITE, StubClient, USER_AGENT, config};
    use crate::transport::{ApiResponse as RawResponse, TransportError};

    const SCRIPT: &[u8] = b"hello";
    const SCRIPT_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[tokio::test]
    async fn request_shape_follows_cookie_generation() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"errorMessage":"","payload":"sensor-1"}"#,
            r#"{"payload":"sensor-2"}"#,
        ]));
        let mut provider = HyperProvider::with_client(config(false), client.clone());
        provider.set_script_body(Bytes::from_static(SCRIPT)).await.unwrap();

        assert_eq!(
            provider.generate_web_sensor(0, "abck", None).await.unwrap(),
            "sensor-1"
        );
        assert_eq!(
            provider
                .generate_web_sensor(1, "abck", Some("bmsz"))
                .await
                .unwrap(),
            "sensor-2"
        );

        let requests = client.requests();
        assert_eq!(requests[0].url.as_str(), GENERATE_WEB_SENSOR_ENDPOINT);
        assert_eq!(requests[0].headers["x-api-key"], "test-key");

        let first = client.json_body(0);
        assert_eq!(first["version"], "1");
        assert_eq!(first["userAgent"], USER_AGENT);
        assert_eq!(first["pageUrl"], SITE);
        assert_eq!(first["scriptHash"], SCRIPT_SHA256);
        assert!(first.get("bmsz").is_none());
        assert!(first.get("dynamicValues").is_none());

        let second = client.json_body(1);
        assert_eq!(second["version"], "2");
        assert_eq!(second["bmsz"], "bmsz");
    }

    #[tokio::test]
    async fn error_message_fails_even_on_200() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"errorMessage":"quota exceeded","payload":""}"#,
        ]));
        let provider = HyperProvider::with_client(config(false), client);

        let err = provider.generate_web_sensor(0, "abck", None).await.unwrap_err();
        assert_eq!(err.to_string(), "hyper-solutions: quota exceeded");
    }

    #[tokio::test]
    async fn cache_hit_resolves_without_compute() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"payload":"cached-values"}"#,
            r#"{"payload":"sensor"}"#,
        ]));
        let mut provider = HyperProvider::with_client(config(true), client.clone());

        provider.set_script_body(Bytes::from_static(SCRIPT)).await.unwrap();
        provider.generate_web_sensor(0, "abck", None).await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url.as_str(), SCRIPT_CONFIG_CACHE_ENDPOINT);
        assert_eq!(client.json_body(0)["hash"], SCRIPT_SHA256);
        assert_eq!(client.json_body(1)["dynamicValues"], "cached-values");
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_compute() {
        for miss in [r#"{"payload":"false"}"#, r#"{"payload":""}"#] {
            let client = Arc::new(StubClient::ok(&[miss, r#"{"payload":"computed"}"#]));
            let mut provider = HyperProvider::with_client(config(true), client.clone());

            provider.set_script_body(Bytes::from_static(SCRIPT)).await.unwrap();

            let requests = client.requests();
            assert_eq!(requests.len(), 2);
            assert_eq!(requests[1].url.as_str(), SCRIPT_CONFIG_ENDPOINT);
            assert_eq!(client.json_body(1)["script"], "hello");
            assert_eq!(
                provider.dynamic_config(),
                &DynamicConfig::Resolved("computed".into())
            );
        }
    }

    #[tokio::test]
    async fn compute_transport_failure_fails_script_update() {
        let client = Arc::new(StubClient::new(vec![
            Ok(RawResponse::new(200, r#"{"payload":"false"}"#)),
            Err(TransportError::Request("timed out".into())),
        ]));
        let mut provider = HyperProvider::with_client(config(true), client);

        let err = provider
            .set_script_body(Bytes::from_static(SCRIPT))
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(provider.script().fingerprint(), "");
        assert!(matches!(
            provider.generate_web_sensor(0, "abck", None).await,
            Err(ProviderError {
                kind: ProviderErrorKind::StaleDynamicConfig,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_computed_payload_fails_script_update() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"payload":"false"}"#,
            r#"{"errorMessage":"","payload":""}"#,
        ]));
        let mut provider = HyperProvider::with_client(config(true), client.clone());

        let err = provider
            .set_script_body(Bytes::from_static(SCRIPT))
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ProviderErrorKind::Decode(_)));
        assert_eq!(client.requests().len(), 2);
        assert!(matches!(
            provider.dynamic_config(),
            DynamicConfig::Stale(_)
        ));
    }

    #[tokio::test]
    async fn new_script_body_replaces_config() {
        let client = Arc::new(StubClient::ok(&[
            r#"{"payload":"config-a"}"#,
            r#"{"payload":"config-b"}"#,
        ]));
        let mut provider = HyperProvider::with_client(config(true), client);

        provider.set_script_body(Bytes::from_static(b"a")).await.unwrap();
        provider.set_script_body(Bytes::from_static(b"b")).await.unwrap();

        assert_eq!(
            provider.dynamic_config(),
            &DynamicConfig::Resolved("config-b".into())
        );
    }
}
