//! Shared configuration handed to every sensor provider.
//!
//! A single [`ApiConfig`] is built once and shared by reference (`Arc`) with
//! whichever provider is active, so switching vendors never means rebuilding
//! credentials or target-site parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors raised while building or loading an [`ApiConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("invalid site url: {0}")]
    InvalidSite(#[from] url::ParseError),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credentials and target-site parameters shared by all providers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Vendor API key.
    pub api_key: String,
    /// User-Agent the sensor must be generated for.
    pub user_agent: String,
    /// URL of the protected page, eg. `https://www.example.com/login/`.
    pub site: String,
    /// Set when the site serves dynamic detection scripts.
    #[serde(default)]
    pub dynamic: bool,
}

impl ApiConfig {
    /// Creates a config without validation.
    pub fn new(
        api_key: impl Into<String>,
        user_agent: impl Into<String>,
        site: impl Into<String>,
        dynamic: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            user_agent: user_agent.into(),
            site: site.into(),
            dynamic,
        }
    }

    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::new()
    }

    /// Loads and validates a config from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the required fields are present and the site is an absolute URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("api_key"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField("user_agent"));
        }
        if self.site.trim().is_empty() {
            return Err(ConfigError::MissingField("site"));
        }
        Url::parse(&self.site)?;
        Ok(())
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("site", &self.site)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Fluent builder for [`ApiConfig`].
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    api_key: Option<String>,
    user_agent: Option<String>,
    site: Option<String>,
    dynamic: bool,
}

impl ApiConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn build(self) -> Result<ApiConfig, ConfigError> {
        let config = ApiConfig {
            api_key: self.api_key.ok_or(ConfigError::MissingField("api_key"))?,
            user_agent: self
                .user_agent
                .ok_or(ConfigError::MissingField("user_agent"))?,
            site: self.site.ok_or(ConfigError::MissingField("site"))?,
            dynamic: self.dynamic,
        };
        config.validate()?;
        Ok(config)
    }
}
