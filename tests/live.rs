use std::env;
use std::error::Error;
use std::sync::Arc;

use akamai_sensor_kit::{
    ApiConfig, ProviderKind, ReqwestSensorHttpClient, VERSION, build_provider,
    is_cookie_no_longer_valid, is_cookie_valid,
};
use bytes::Bytes;

fn var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Requests one sensor from a live vendor.
///
/// Configure with `SENSOR_PROVIDER`, `SENSOR_API_KEY`, `SENSOR_SITE`,
/// `SENSOR_USER_AGENT`, `SENSOR_ABCK`, `SENSOR_BMSZ`, and optionally
/// `SENSOR_SCRIPT_FILE` with `SENSOR_DYNAMIC=1`.
#[tokio::test]
#[ignore = "Requires network access and a vendor API key"]
async fn live_sensor_round_trip() -> Result<(), Box<dyn Error>> {
    println!("akamai-sensor-kit {VERSION} live smoke test");

    let kind: ProviderKind = var("SENSOR_PROVIDER", "hyper").parse()?;
    let dynamic = matches!(var("SENSOR_DYNAMIC", "0").as_str(), "1" | "true" | "yes");

    let config = ApiConfig::builder()
        .with_api_key(var("SENSOR_API_KEY", ""))
        .with_user_agent(var(
            "SENSOR_USER_AGENT",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ))
        .with_site(var("SENSOR_SITE", "https://www.example.com/"))
        .dynamic(dynamic)
        .build()?;

    let client = Arc::new(ReqwestSensorHttpClient::with_timeout(
        std::time::Duration::from_secs(30),
    )?);
    let mut provider = build_provider(kind, Arc::new(config), client);

    if let Ok(path) = env::var("SENSOR_SCRIPT_FILE") {
        let script = std::fs::read(path)?;
        provider.set_script_body(Bytes::from(script)).await?;
    }

    let abck = var("SENSOR_ABCK", "0~-1~YAAQ~-1~-1");
    let bmsz = var("SENSOR_BMSZ", "");
    println!(
        "abck valid={} not invalidated={}",
        is_cookie_valid(&abck),
        is_cookie_no_longer_valid(&abck)
    );

    let sensor = provider
        .generate_web_sensor(0, &abck, Some(bmsz.as_str()))
        .await?;
    println!("{kind} sensor: {sensor}");
    assert!(!sensor.is_empty());

    Ok(())
}
