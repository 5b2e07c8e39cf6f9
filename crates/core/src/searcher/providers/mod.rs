//! Concrete provider adapters.

mod eztv;
mod jackett;
mod rate_limit;
mod torrents_api;

pub use eztv::EztvProvider;
pub use jackett::JackettProvider;
pub use rate_limit::{RateLimitedProvider, TokenBucket};
pub use torrents_api::TorrentsApiProvider;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ProviderConfig;

use super::{ProviderError, TorrentProvider};

/// Build the adapter described by one config entry, rate limited when
/// the entry sets `rate_limit_rpm`.
pub fn build_provider(
    config: &ProviderConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn TorrentProvider>, ProviderError> {
    let client = http_client(request_timeout)?;
    let rpm = config.rate_limit_rpm();

    Ok(match config {
        ProviderConfig::Jackett(c) => wrap(JackettProvider::new(client, c.clone()), rpm),
        ProviderConfig::Eztv(c) => wrap(EztvProvider::new(client, c.clone()), rpm),
        ProviderConfig::TorrentsApi(c) => wrap(TorrentsApiProvider::new(client, c.clone()), rpm),
    })
}

fn wrap<P: TorrentProvider + 'static>(provider: P, rpm: Option<u32>) -> Arc<dyn TorrentProvider> {
    match rpm {
        Some(rpm) => Arc::new(RateLimitedProvider::new(provider, rpm)),
        None => Arc::new(provider),
    }
}

fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` and decode a JSON body, mapping failures to provider errors.
async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, ProviderError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            ProviderError::Network(e.to_string())
        } else {
            ProviderError::Api(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api(format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Index APIs disagree on whether counts are numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Lenient {
    fn as_u64(&self) -> u64 {
        match self {
            Lenient::Int(n) => (*n).max(0) as u64,
            Lenient::Float(f) if *f > 0.0 => *f as u64,
            Lenient::Float(_) => 0,
            Lenient::Text(s) => s.trim().parse::<u64>().unwrap_or(0),
        }
    }

    fn as_u32(&self) -> u32 {
        self.as_u64().min(u32::MAX as u64) as u32
    }
}

fn lenient_u32(value: &Option<Lenient>) -> u32 {
    value.as_ref().map(Lenient::as_u32).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EztvConfig, JackettConfig};

    #[test]
    fn test_lenient_numbers() {
        let values: Vec<Lenient> = serde_json::from_str(r#"[12, "34", 5.9, -3, "n/a"]"#).unwrap();
        let parsed: Vec<u64> = values.iter().map(Lenient::as_u64).collect();
        assert_eq!(parsed, vec![12, 34, 5, 0, 0]);
    }

    #[test]
    fn test_build_provider_uses_config_name() {
        let provider = build_provider(
            &ProviderConfig::Jackett(JackettConfig {
                name: "local-jackett".to_string(),
                url: "http://localhost:9117".to_string(),
                api_key: "key".to_string(),
                indexer: "all".to_string(),
                rate_limit_rpm: Some(30),
            }),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.name(), "local-jackett");

        let provider = build_provider(
            &ProviderConfig::Eztv(EztvConfig {
                name: "EZTV".to_string(),
                url: "https://eztv.re".to_string(),
                rate_limit_rpm: None,
            }),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.name(), "EZTV");
        assert!(!provider.supports(crate::searcher::SearchCategory::Movies));
    }
}
