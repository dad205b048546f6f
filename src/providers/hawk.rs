//! Hawk sensor API.
//!
//! The sensor endpoint answers with plain text. When dynamic mode is on, the
//! script configuration is resolved in two steps: a cache lookup keyed by the
//! raw script, then, on a `false` or empty answer, a compute call with the script body
//! base64-encoded.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::Serialize;

use super::{
    DynamicConfig, ProviderError, ProviderErrorKind, ProviderKind, ScriptState, SensorProvider,
    decode_text, default_client, dispatch, json_request, non_empty_config, second_generation,
};
use crate::config::ApiConfig;
use crate::transport::{ApiRequest, SensorHttpClient};

const GENERATE_WEB_SENSOR_ENDPOINT: &str = "https://ak01-eu.hwkapi.com/akamai/generate";
const SCRIPT_CONFIG_ENDPOINT: &str = "https://ak-ppsaua.hwkapi.com/006180d12cf7";
const SCRIPT_CONFIG_CACHE_ENDPOINT: &str = "https://ak-ppsaua.hwkapi.com/006180d12cf7/c";

/// Separates the sensor from trailing data in second generation responses.
const BMSZ_SEPARATOR: &str = "****";
const CACHE_MISS: &str = "false";

const FIRST_ATTEMPT_EVENTS: &str = "0,0";
const RETRY_EVENTS: &str = "1,0";

#[derive(Debug, Serialize)]
struct GenerateWebSensorRequest<'a> {
    site: &'a str,
    abck: &'a str,
    events: &'a str,
    user_agent: &'a str,
    #[serde(rename = "bm_sz", skip_serializing_if = "str::is_empty")]
    bmsz: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    config: &'a str,
}

#[derive(Debug, Serialize)]
struct CacheLookupRequest<'a> {
    hash: &'a str,
}

#[derive(Debug, Serialize)]
struct ComputeConfigRequest {
    body: String,
}

/// Adapter for the Hawk sensor and dynamic script endpoints.
pub struct HawkProvider {
    config: Arc<ApiConfig>,
    client: Arc<dyn SensorHttpClient>,
    script: ScriptState,
    dynamic_config: DynamicConfig,
}

impl HawkProvider {
    const KIND: ProviderKind = ProviderKind::Hawk;

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

    fn request<T: Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<ApiRequest, ProviderErrorKind> {
        json_request(
            endpoint,
            &[
                ("X-Api-Key", self.config.api_key.as_str()),
                ("Content-Type", "application/json"),
                ("X-Sec", "new"),
            ],
            payload,
        )
    }

    async fn request_sensor(
        &self,
        iteration: u32,
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
            site: &self.config.site,
            abck,
            events: if iteration > 0 {
                RETRY_EVENTS
            } else {
                FIRST_ATTEMPT_EVENTS
            },
            user_agent: &self.config.user_agent,
            bmsz: bmsz.unwrap_or_default(),
            config: dynamic_config,
        };

        let request = self.request(GENERATE_WEB_SENSOR_ENDPOINT, &payload)?;
        let body = decode_text(dispatch(self.client.as_ref(), Self::KIND, request).await?)?;

        if bmsz.is_some() {
            let sensor = body.split(BMSZ_SEPARATOR).next().unwrap_or_default();
            return Ok(sensor.to_string());
        }

        Ok(body)
    }

    async fn resolve_dynamic_config(&self, script: &[u8]) -> Result<String, ProviderErrorKind> {
        let script_text = String::from_utf8_lossy(script);
        let lookup = CacheLookupRequest { hash: &script_text };
        let request = self.request(SCRIPT_CONFIG_CACHE_ENDPOINT, &lookup)?;
        let cached = decode_text(dispatch(self.client.as_ref(), Self::KIND, request).await?)?;

        if !cached.is_empty() && cached != CACHE_MISS {
            log::info!("{}: dynamic script config served from cache", Self::KIND);
            return Ok(cached);
        }

        let compute = ComputeConfigRequest {
            body: BASE64.encode(script),
        };
        let request = self.request(SCRIPT_CONFIG_ENDPOINT, &compute)?;
        let computed = non_empty_config(decode_text(
            dispatch(self.client.as_ref(), Self::KIND, request).await?,
        )?)?;

        log::info!("{}: dynamic script config computed", Self::KIND);
        Ok(computed)
    }
}

#[async_trait]
impl SensorProvider for HawkProvider {
    fn kind(&self) -> ProviderKind {
        Self::KIND
    }

    async fn generate_web_sensor(
        &self,
        iteration: u32,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.request_sensor(iteration, abck, bmsz)
            .await
            .map_err(|kind| ProviderError::new(Self::KIND, kind))
    }

    fn set_script_url(&mut self, url: &str) {
        self.script.set_url(url);
    }

    async fn set_script_body(&mut self, body: Bytes) -> Result<(), ProviderError> {
        if self.config.dynamic {
            match self.resolve_dynamic_config(&body).await {
                Ok(blob) => self.dynamic_config = DynamicConfig::Resolved(blob),
                Err(kind) => {
                    log::warn!("{}: failed to resolve dynamic script config: {kind}", Self::KIND);
                    self.dynamic_config.mark_stale();
                    return Err(ProviderError::new(Self::KIND, kind));
                }
            }
        }

        self.script.replace_body(body, String::new());
        Ok(())
    }
}
