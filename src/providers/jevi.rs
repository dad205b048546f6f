//! Jevi sensor API.
//!
//! Form-encoded request, plain-text response. Accounts with response
//! obfuscation enabled get the sensor XOR-encrypted with a per-account key,
//! see [`JeviProvider::with_decryption_key`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::form_urlencoded;

use super::{
    ProviderError, ProviderErrorKind, ProviderKind, ScriptState, SensorProvider, decode_text,
    default_client, dispatch, parse_endpoint, second_generation,
};
use crate::config::ApiConfig;
use crate::transport::{ApiRequest, SensorHttpClient};
use crate::utility::xor;

const GENERATE_WEB_SENSOR_ENDPOINT: &str = "https://www.jevi.dev/Akamai";
const MODE: &str = "API";

/// Adapter for the Jevi sensor endpoint.
pub struct JeviProvider {
    config: Arc<ApiConfig>,
    client: Arc<dyn SensorHttpClient>,
    script: ScriptState,
    decryption_key: Option<Vec<u8>>,
}

impl JeviProvider {
    const KIND: ProviderKind = ProviderKind::Jevi;

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
            decryption_key: None,
        }
    }

    /// Decrypts every response with `key` before returning it. An empty key
    /// disables decryption.
    pub fn with_decryption_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        let key = key.into();
        self.decryption_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Script URL, body and fingerprint from the last successful update.
    pub fn script(&self) -> &ScriptState {
        &self.script
    }

    /// Form body with keys in lexical order.
    fn encode_form(&self, abck: &str, bmsz: Option<&str>) -> String {
        let mut pairs = vec![("abck", abck)];
        if let Some(bmsz) = bmsz {
            pairs.push(("bmsz", bmsz));
        }
        if self.config.dynamic {
            pairs.push(("etag", self.script.fingerprint()));
        }
        pairs.extend([
            ("key", self.config.api_key.as_str()),
            ("mode", MODE),
            ("site", self.config.site.as_str()),
            ("ua", self.config.user_agent.as_str()),
        ]);

        pairs
            .into_iter()
            .map(|(name, value)| format!("{name}={}", encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn request_sensor(
        &self,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderErrorKind> {
        let form = self.encode_form(abck, second_generation(bmsz));
        let request = ApiRequest::post(parse_endpoint(GENERATE_WEB_SENSOR_ENDPOINT)?)
            .with_header("content-type", "application/x-www-form-urlencoded")?
            .with_body(form);

        let body = dispatch(self.client.as_ref(), Self::KIND, request).await?;

        match &self.decryption_key {
            Some(key) => decode_text(Bytes::from(xor(&body, key))),
            None => decode_text(body),
        }
    }
}

/// Form-encodes a value the way the vendor's reference client does: `~` stays
/// literal and `*` is percent-encoded.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%7E", "~")
        .replace('*', "%2A")
}

#[async_trait]
impl SensorProvider for JeviProvider {
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
