//! EZTV adapter: TV episodes looked up by IMDb id.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::EztvConfig;
use crate::searcher::{ProviderError, SearchCategory, SearchQuery, TorrentCandidate, TorrentProvider};

use super::{get_json, lenient_u32, Lenient};

const PAGE_LIMIT: u32 = 50;

pub struct EztvProvider {
    client: Client,
    config: EztvConfig,
}

impl EztvProvider {
    pub fn new(client: Client, config: EztvConfig) -> Self {
        Self { client, config }
    }

    fn build_url(&self, imdb_digits: &str) -> String {
        format!(
            "{}/api/get-torrents?imdb_id={}&limit={}",
            self.config.url.trim_end_matches('/'),
            imdb_digits,
            PAGE_LIMIT
        )
    }
}

/// EZTV wants the numeric part of an IMDb id ("tt0903747" -> "0903747").
fn imdb_digits(imdb_id: &str) -> Option<&str> {
    let id = imdb_id.trim();
    let digits = id.strip_prefix("tt").unwrap_or(id);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

#[async_trait]
impl TorrentProvider for EztvProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supports(&self, category: SearchCategory) -> bool {
        category == SearchCategory::Tv
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        let digits = query
            .imdb_id
            .as_deref()
            .and_then(imdb_digits)
            .ok_or_else(|| ProviderError::MissingIdentifier(self.config.name.clone()))?;

        debug!(provider = %self.config.name, imdb_id = %digits, "Searching EZTV");
        let response: EztvResponse = get_json(&self.client, &self.build_url(digits)).await?;

        Ok(response
            .torrents
            .into_iter()
            .filter(|t| !t.magnet_url.is_empty())
            .map(|t| TorrentCandidate {
                title: t.title,
                magnet_uri: t.magnet_url,
                size_bytes: t.size_bytes.as_ref().map(Lenient::as_u64).unwrap_or(0),
                seeds: lenient_u32(&t.seeds),
                peers: lenient_u32(&t.peers),
                provider: self.config.name.clone(),
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct EztvResponse {
    #[serde(default)]
    torrents: Vec<EztvTorrent>,
}

#[derive(Debug, Deserialize)]
struct EztvTorrent {
    title: String,
    #[serde(default)]
    magnet_url: String,
    size_bytes: Option<Lenient>,
    seeds: Option<Lenient>,
    peers: Option<Lenient>,
}
