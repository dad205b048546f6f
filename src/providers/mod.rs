//! Sensor provider integrations.
//!
//! Every vendor speaks its own wire protocol (header names, payload fields,
//! success/error envelope). The adapters in this module hide those details
//! behind [`SensorProvider`] so callers can switch vendors without touching
//! call sites.

pub mod fdis;
pub mod hawk;
pub mod hyper;
pub mod jevi;

pub use fdis::FdisProvider;
pub use hawk::HawkProvider;
pub use hyper::HyperProvider;
pub use jevi::JeviProvider;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;
use crate::transport::{
    ApiRequest, ReqwestSensorHttpClient, SensorHttpClient, TransportError,
};

/// Shared interface implemented by sensor vendors.
///
/// `set_script_url` and `set_script_body` take `&mut self`: a provider shared
/// between tasks must be wrapped in a lock so that no sensor is generated
/// while the script state is being replaced.
#[async_trait]
pub trait SensorProvider: Send + Sync {
    /// Vendor behind this provider, also attached to every error it returns.
    fn kind(&self) -> ProviderKind;

    /// Generates the sensor string that has to be posted to the script URL.
    ///
    /// `iteration` is 0 for the first attempt on a page. `bmsz` carries the
    /// `bm_sz` cookie for second generation challenges; `None` and an empty
    /// string are treated the same.
    async fn generate_web_sensor(
        &self,
        iteration: u32,
        abck: &str,
        bmsz: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Sets the absolute URL of the detection script,
    /// eg. `https://www.example.com/akam/13/abc`.
    fn set_script_url(&mut self, url: &str);

    /// Stores the detection script, computes its fingerprint and, for vendors
    /// with a dynamic configuration step, resolves the configuration when
    /// dynamic mode is enabled.
    async fn set_script_body(&mut self, body: Bytes) -> Result<(), ProviderError>;
}

/// Identity of a sensor vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Fdis,
    Hawk,
    Hyper,
    Jevi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Fdis,
        ProviderKind::Hawk,
        ProviderKind::Hyper,
        ProviderKind::Jevi,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Fdis => "fdis",
            ProviderKind::Hawk => "hawk",
            ProviderKind::Hyper => "hyper-solutions",
            ProviderKind::Jevi => "jevi",
        }
    }

    /// Whether the vendor resolves a configuration blob from the script body.
    pub fn resolves_dynamic_config(&self) -> bool {
        matches!(self, ProviderKind::Hawk | ProviderKind::Hyper)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| {
                kind.name() == normalized
                    || (*kind == ProviderKind::Hyper && normalized == "hyper")
            })
            .ok_or_else(|| UnknownProvider(value.to_string()))
    }
}

/// Builds a boxed provider of the given kind over a shared config and transport.
pub fn build_provider(
    kind: ProviderKind,
    config: Arc<ApiConfig>,
    client: Arc<dyn SensorHttpClient>,
) -> Box<dyn SensorProvider> {
    match kind {
        ProviderKind::Fdis => Box::new(FdisProvider::with_client(config, client)),
        ProviderKind::Hawk => Box::new(HawkProvider::with_client(config, client)),
        ProviderKind::Hyper => Box::new(HyperProvider::with_client(config, client)),
        ProviderKind::Jevi => Box::new(JeviProvider::with_client(config, client)),
    }
}

/// Error surfaced by a provider, tagged with the vendor that produced it.
#[derive(Debug, Error)]
#[error("{provider}: {kind}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    #[source]
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Transport(_))
    }

    pub fn is_status(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Status { .. })
    }

    /// HTTP status of a rejected call, if that is what failed.
    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            ProviderErrorKind::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Underlying cause of a [`ProviderError`].
#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("connection error: {0}")]
    Transport(#[from] TransportError),
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },
    #[error("{0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("dynamic script config does not match the current script body")]
    StaleDynamicConfig,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Script data a provider keeps between sensor requests.
#[derive(Debug, Clone, Default)]
pub struct ScriptState {
    url: String,
    body: Bytes,
    fingerprint: String,
}

impl ScriptState {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Hex digest of the body; empty for vendors that do not fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub(crate) fn replace_body(&mut self, body: Bytes, fingerprint: String) {
        self.body = body;
        self.fingerprint = fingerprint;
    }
}

/// Vendor-computed configuration for the current script body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DynamicConfig {
    /// No script body resolved yet.
    #[default]
    Unset,
    Resolved(String),
    /// The last resolution failed; the previous blob is kept but must not be
    /// sent since it belongs to another script body.
    Stale(String),
}

impl DynamicConfig {
    /// Blob to attach to a sensor request.
    pub fn current(&self) -> Result<Option<&str>, ProviderErrorKind> {
        match self {
            DynamicConfig::Unset => Ok(None),
            DynamicConfig::Resolved(blob) => Ok(Some(blob.as_str())),
            DynamicConfig::Stale(_) => Err(ProviderErrorKind::StaleDynamicConfig),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DynamicConfig::Resolved(_))
    }

    pub(crate) fn mark_stale(&mut self) {
        let previous = match std::mem::take(self) {
            DynamicConfig::Resolved(blob) | DynamicConfig::Stale(blob) => blob,
            DynamicConfig::Unset => String::new(),
        };
        *self = DynamicConfig::Stale(previous);
    }
}

/// Returns the `bm_sz` value when it is actually present.
pub(crate) fn second_generation(bmsz: Option<&str>) -> Option<&str> {
    bmsz.filter(|value| !value.is_empty())
}

pub(crate) fn default_client(
    provider: ProviderKind,
) -> Result<Arc<dyn SensorHttpClient>, ProviderError> {
    ReqwestSensorHttpClient::new()
        .map(|client| Arc::new(client) as Arc<dyn SensorHttpClient>)
        .map_err(|err| ProviderError::new(provider, ProviderErrorKind::Transport(err)))
}

/// Builds a POST request with a JSON body and the given headers.
pub(crate) fn json_request<T: Serialize>(
    endpoint: &str,
    headers: &[(&str, &str)],
    payload: &T,
) -> Result<ApiRequest, ProviderErrorKind> {
    let body = serde_json::to_vec(payload).map_err(ProviderErrorKind::Encode)?;
    let mut request = ApiRequest::post(parse_endpoint(endpoint)?).with_body(body);
    for (name, value) in headers {
        request = request.with_header(name, value)?;
    }
    Ok(request)
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, ProviderErrorKind> {
    Url::parse(endpoint).map_err(|err| ProviderErrorKind::InvalidRequest(err.to_string()))
}

/// Sends the request and returns the body of a 200 response.
///
/// Any other status fails without looking at the body.
pub(crate) async fn dispatch(
    client: &dyn SensorHttpClient,
    provider: ProviderKind,
    request: ApiRequest,
) -> Result<Bytes, ProviderErrorKind> {
    let endpoint = request.url.clone();
    log::debug!("{provider} -> {} {endpoint}", request.method);

    let response = client.execute(request).await?;
    log::debug!("{provider} <- {} {endpoint}", response.status);

    if !response.is_ok() {
        return Err(ProviderErrorKind::Status {
            code: response.status,
            reason: response.reason(),
        });
    }

    Ok(response.body)
}

pub(crate) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProviderErrorKind> {
    serde_json::from_slice(body).map_err(|err| ProviderErrorKind::Decode(err.to_string()))
}

/// Rejects an empty configuration returned by a compute endpoint.
pub(crate) fn non_empty_config(config: String) -> Result<String, ProviderErrorKind> {
    if config.is_empty() {
        return Err(ProviderErrorKind::Decode("empty dynamic script config".into()));
    }
    Ok(config)
}

pub(crate) fn decode_text(body: Bytes) -> Result<String, ProviderErrorKind> {
    String::from_utf8(body.to_vec()).map_err(|err| ProviderErrorKind::Decode(err.to_string()))
}
