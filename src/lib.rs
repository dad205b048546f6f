//! # akamai-sensor-kit
//!
//! One async interface over several third-party Akamai sensor generation
//! APIs, plus the small helpers needed around them.
//!
//! The crate does not fetch cookies, execute scripts or post the sensor to
//! the protected site; it only talks to the sensor vendors.
//!
//! ## Features
//!
//! - Swappable providers behind [`SensorProvider`] (FDIS, Hawk, Hyper
//!   Solutions, Jevi)
//! - Dynamic script configuration resolution for vendors that need it
//! - Injectable HTTP transport for custom proxies, retries and tests
//! - `_abck` cookie checks, script path scraping, XOR response decryption
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use akamai_sensor_kit::{ApiConfig, HyperProvider, SensorProvider, is_cookie_valid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ApiConfig::new(
//!         "api-key",
//!         "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
//!         "https://www.example.com/login/",
//!         false,
//!     ));
//!     let mut provider = HyperProvider::new(config)?;
//!     provider.set_script_url("https://www.example.com/akam/13/abc");
//!
//!     let abck = "ABCDEF~-1~YAAQ~-1~-1";
//!     if !is_cookie_valid(abck) {
//!         let sensor = provider.generate_web_sensor(0, abck, None).await?;
//!         println!("sensor_data: {sensor}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod providers;
pub mod transport;
pub mod utility;

pub use crate::config::{ApiConfig, ApiConfigBuilder, ConfigError};

pub use crate::providers::{
    DynamicConfig,
    FdisProvider,
    HawkProvider,
    HyperProvider,
    JeviProvider,
    ProviderError,
    ProviderErrorKind,
    ProviderKind,
    ScriptState,
    SensorProvider,
    UnknownProvider,
    build_provider,
};

pub use crate::transport::{
    ApiRequest,
    ApiResponse,
    ReqwestSensorHttpClient,
    SensorHttpClient,
    TransportError,
};

pub use crate::utility::{
    ScriptPathError,
    is_cookie_no_longer_valid,
    is_cookie_valid,
    scrape_script_path,
    scrape_script_url,
    xor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
