//! Torrents-API adapter (free-text JSON search).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::TorrentsApiConfig;
use crate::searcher::{ProviderError, SearchQuery, TorrentCandidate, TorrentProvider};

use super::{get_json, lenient_u32, Lenient};

pub struct TorrentsApiProvider {
    client: Client,
    config: TorrentsApiConfig,
}

impl TorrentsApiProvider {
    pub fn new(client: Client, config: TorrentsApiConfig) -> Self {
        Self { client, config }
    }

    fn build_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}/api/search?query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&query.query)
        )
    }
}

#[async_trait]
impl TorrentProvider for TorrentsApiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        debug!(provider = %self.config.name, query = %query.query, "Searching Torrents-API");
        let response: TorrentsApiResponse = get_json(&self.client, &self.build_url(query)).await?;

        Ok(response
            .torrents
            .into_iter()
            .filter(|t| !t.magnet.is_empty())
            .map(|t| TorrentCandidate {
                title: t.title,
                magnet_uri: t.magnet,
                size_bytes: t.size.as_ref().map(parse_size).unwrap_or(0),
                seeds: lenient_u32(&t.seeds),
                peers: lenient_u32(&t.peers),
                provider: self.config.name.clone(),
            })
            .collect())
    }
}

/// Sizes arrive either as byte counts or as labels like "1.4 GB".
fn parse_size(value: &Lenient) -> u64 {
    let Lenient::Text(text) = value else {
        return value.as_u64();
    };

    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let Ok(number) = number.trim().parse::<f64>() else {
        return 0;
    };

    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" | "KIB" => 1024.0,
        "MB" | "MIB" => 1024.0 * 1024.0,
        "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "TIB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return 0,
    };
    (number * multiplier).max(0.0) as u64
}

#[derive(Debug, Deserialize)]
struct TorrentsApiResponse {
    #[serde(default)]
    torrents: Vec<TorrentsApiTorrent>,
}

#[derive(Debug, Deserialize)]
struct TorrentsApiTorrent {
    title: String,
    #[serde(default)]
    magnet: String,
    size: Option<Lenient>,
    seeds: Option<Lenient>,
    peers: Option<Lenient>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::SearchCategory;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_size_labels() {
        assert_eq!(parse_size(&Lenient::Int(1234)), 1234);
        assert_eq!(parse_size(&Lenient::Text("2 KB".to_string())), 2048);
        assert_eq!(
            parse_size(&Lenient::Text("1.5 GB".to_string())),
            (1.5 * 1024.0 * 1024.0 * 1024.0) as u64
        );
        assert_eq!(parse_size(&Lenient::Text("700MiB".to_string())), 700 * 1024 * 1024);
        assert_eq!(parse_size(&Lenient::Text("huge".to_string())), 0);
        assert_eq!(parse_size(&Lenient::Text("3 parsecs".to_string())), 0);
    }

    #[tokio::test]
    async fn test_search_free_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("query", "Inception 2010"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "torrents": [
                    {
                        "title": "Inception.2010.720p.WEB-DL",
                        "magnet": "magnet:?xt=urn:btih:dddddddddddddddddddddddddddddddddddddddd",
                        "size": "1.4 GB",
                        "seeds": "10"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let provider = TorrentsApiProvider::new(
            Client::new(),
            TorrentsApiConfig {
                name: "Torrents-API".to_string(),
                url: server.uri(),
                rate_limit_rpm: None,
            },
        );
        let results = provider
            .search(&SearchQuery::new("Inception 2010", SearchCategory::Movies))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].seeds, 10);
        assert_eq!(results[0].peers, 0);
        assert!(results[0].size_bytes > 1024 * 1024 * 1024);
        assert_eq!(results[0].provider, "Torrents-API");
    }

    #[tokio::test]
    async fn test_missing_torrents_field_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let provider = TorrentsApiProvider::new(
            Client::new(),
            TorrentsApiConfig {
                name: "Torrents-API".to_string(),
                url: server.uri(),
                rate_limit_rpm: None,
            },
        );
        let results = provider
            .search(&SearchQuery::new("anything", SearchCategory::Anime))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
