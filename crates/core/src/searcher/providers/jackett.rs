//! Jackett indexer adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::JackettConfig;
use crate::searcher::{ProviderError, SearchCategory, SearchQuery, TorrentCandidate, TorrentProvider};

use super::get_json;

/// One Jackett indexer (or the "all" aggregate) exposed as a provider.
pub struct JackettProvider {
    client: Client,
    config: JackettConfig,
}

impl JackettProvider {
    pub fn new(client: Client, config: JackettConfig) -> Self {
        Self { client, config }
    }

    fn build_search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&query.query)
        );
        for cat_id in category_to_torznab_ids(query.category) {
            url.push_str(&format!("&Category[]={}", cat_id));
        }
        url
    }
}

#[async_trait]
impl TorrentProvider for JackettProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        let url = self.build_search_url(query);
        debug!(provider = %self.config.name, indexer = %self.config.indexer, "Searching Jackett");

        let response: JackettResponse = get_json(&self.client, &url).await?;
        Ok(response
            .Results
            .into_iter()
            .filter_map(|r| into_candidate(r, &self.config.name))
            .collect())
    }
}

/// Torznab category ids for a search category.
fn category_to_torznab_ids(category: SearchCategory) -> &'static [u32] {
    match category {
        SearchCategory::Movies => &[2000],
        SearchCategory::Tv => &[5000],
        SearchCategory::Anime => &[5070],
    }
}

fn into_candidate(r: JackettResult, provider: &str) -> Option<TorrentCandidate> {
    // Results with neither a magnet nor an info hash cannot be started.
    let magnet_uri = match (r.MagnetUri, r.InfoHash) {
        (Some(magnet), _) if magnet.starts_with("magnet:") => magnet,
        (_, Some(hash)) if !hash.is_empty() => format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash.to_lowercase(),
            urlencoding::encode(&r.Title)
        ),
        _ => return None,
    };

    let seeds = r.Seeders.unwrap_or(0).max(0);
    Some(TorrentCandidate {
        title: r.Title,
        magnet_uri,
        size_bytes: r.Size.unwrap_or(0).max(0) as u64,
        seeds: seeds as u32,
        peers: r.Peers.unwrap_or(0).saturating_sub(seeds).max(0) as u32,
        provider: provider.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i64>,
    Peers: Option<i64>,
}
