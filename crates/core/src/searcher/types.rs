//! Types for the torrent search system.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query parameters for a torrent search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text search query.
    pub query: String,
    /// Content category.
    pub category: SearchCategory,
    /// Maximum results to return (falls back to the configured default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// External content identifier (IMDb "tt..." id) for identifier-based providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, category: SearchCategory) -> Self {
        Self {
            query: query.into(),
            category,
            limit: None,
            imdb_id: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    /// Same query with different text (used by query reformulation).
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            query: text.into(),
            ..self.clone()
        }
    }
}

/// Content category for a search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Movies,
    Tv,
    Anime,
}

impl SearchCategory {
    /// Category name as understood by torrent indexes.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchCategory::Movies => "Movies",
            SearchCategory::Tv => "TV",
            SearchCategory::Anime => "Anime",
        }
    }

    /// Media type used by the catalog layer ("movie", "tv", "anime").
    pub fn as_media_type(&self) -> &'static str {
        match self {
            SearchCategory::Movies => "movie",
            SearchCategory::Tv => "tv",
            SearchCategory::Anime => "anime",
        }
    }
}

impl fmt::Display for SearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw torrent listing as returned by one provider. Untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentCandidate {
    pub title: String,
    pub magnet_uri: String,
    /// Size in bytes (0 if the provider did not report one).
    pub size_bytes: u64,
    pub seeds: u32,
    pub peers: u32,
    /// Which provider returned this listing.
    pub provider: String,
}

/// Resolution ladder, lowest first so that `Ord` follows precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "Unknown")]
    Unknown,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "576p")]
    P576,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4K")]
    Uhd4k,
    #[serde(rename = "8K")]
    Uhd8k,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P576 => "576p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::Uhd4k => "4K",
            Quality::Uhd8k => "8K",
        }
    }

    /// Whether this quality satisfies a caller-requested label.
    ///
    /// `"any"` matches everything; `"2160p"` and `"4320p"` are accepted as
    /// aliases for 4K and 8K.
    pub fn matches(&self, requested: &str) -> bool {
        let requested = requested.trim();
        if requested.eq_ignore_ascii_case("any") {
            return true;
        }
        let alias = match requested.to_ascii_lowercase().as_str() {
            "2160p" | "uhd" => Some(Quality::Uhd4k),
            "4320p" => Some(Quality::Uhd8k),
            _ => None,
        };
        alias == Some(*self) || self.as_str().eq_ignore_ascii_case(requested)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse display-class resolution label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "FHD")]
    Fhd,
    #[serde(rename = "UHD")]
    Uhd,
    #[serde(rename = "8K")]
    EightK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Sd => "SD",
            Resolution::Hd => "HD",
            Resolution::Fhd => "FHD",
            Resolution::Uhd => "UHD",
            Resolution::EightK => "8K",
        }
    }
}

/// Video codec, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[serde(rename = "Unknown")]
    Unknown,
    #[serde(rename = "VP9")]
    Vp9,
    #[serde(rename = "AV1")]
    Av1,
    #[serde(rename = "H.264")]
    H264,
    #[serde(rename = "H.265")]
    H265,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Unknown => "Unknown",
            Codec::Vp9 => "VP9",
            Codec::Av1 => "AV1",
            Codec::H264 => "H.264",
            Codec::H265 => "H.265",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release source, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "Unknown")]
    Unknown,
    #[serde(rename = "CAM")]
    Cam,
    #[serde(rename = "DVD")]
    Dvd,
    #[serde(rename = "HDTV")]
    Hdtv,
    #[serde(rename = "WEB-DL")]
    WebDl,
    #[serde(rename = "Blu-ray")]
    BluRay,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Unknown => "Unknown",
            Source::Cam => "CAM",
            Source::Dvd => "DVD",
            Source::Hdtv => "HDTV",
            Source::WebDl => "WEB-DL",
            Source::BluRay => "Blu-ray",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider candidate plus the tags derived from its title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResult {
    #[serde(flatten)]
    pub candidate: TorrentCandidate,
    /// Info hash (lowercase hex) when the magnet carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    pub quality: Quality,
    pub resolution: Option<Resolution>,
    pub codec: Codec,
    pub source: Source,
    pub language: String,
    #[serde(default)]
    pub is_repack: bool,
}

impl NormalizedResult {
    /// Key used to recognise the same content across providers.
    pub fn identity_key(&self) -> String {
        match &self.info_hash {
            Some(hash) => hash.clone(),
            None => self.candidate.magnet_uri.trim().to_string(),
        }
    }
}

/// Errors a single provider can produce. Never fatal to a search.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider connection failed: {0}")]
    Network(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Rate limited for provider {provider}, retry in {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Provider {0} requires an external identifier")]
    MissingIdentifier(String),
}

impl ProviderError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Api(_) => "api",
            ProviderError::Parse(_) => "parse",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::MissingIdentifier(_) => "missing_identifier",
        }
    }
}

/// A uniform adapter over one external torrent index.
#[async_trait]
pub trait TorrentProvider: Send + Sync {
    /// Provider name for logging and result attribution.
    fn name(&self) -> &str;

    /// Whether this provider indexes the given category at all.
    fn supports(&self, _category: SearchCategory) -> bool {
        true
    }

    /// Query the index. Must not write any shared state.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError>;
}

#[async_trait]
impl<T: TorrentProvider + ?Sized> TorrentProvider for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports(&self, category: SearchCategory) -> bool {
        (**self).supports(category)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        (**self).search(query).await
    }
}

/// Extract the info hash from a magnet URI.
///
/// Hex hashes are lowercased; 32-character base32 hashes are decoded to hex.
pub fn info_hash_from_magnet(uri: &str) -> Option<String> {
    let query = uri.trim().strip_prefix("magnet:?")?;
    let raw = query.split('&').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if key != "xt" {
            return None;
        }
        let value = urlencoding::decode(value).ok()?;
        value
            .strip_prefix("urn:btih:")
            .or_else(|| value.strip_prefix("urn:BTIH:"))
            .map(|h| h.to_string())
    })?;

    match raw.len() {
        40 if raw.chars().all(|c| c.is_ascii_hexdigit()) => Some(raw.to_ascii_lowercase()),
        32 => base32_to_hex(&raw),
        _ => None,
    }
}

/// RFC 4648 base32 (no padding) to lowercase hex.
fn base32_to_hex(input: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = String::with_capacity(40);

    for c in input.chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            let byte = (bits >> bit_count) & 0xff;
            out.push_str(&format!("{:02x}", byte));
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_builders() {
        let query = SearchQuery::new("Inception 2010", SearchCategory::Movies)
            .with_limit(10)
            .with_imdb_id("tt1375666");
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.imdb_id.as_deref(), Some("tt1375666"));

        let variant = query.with_text("Inception");
        assert_eq!(variant.query, "Inception");
        assert_eq!(variant.category, SearchCategory::Movies);
        assert_eq!(variant.limit, Some(10));
        assert_eq!(variant.imdb_id.as_deref(), Some("tt1375666"));
    }

    #[test]
    fn test_search_category_names() {
        assert_eq!(SearchCategory::Tv.as_str(), "TV");
        assert_eq!(SearchCategory::Anime.as_media_type(), "anime");
        assert_eq!(
            serde_json::to_string(&SearchCategory::Movies).unwrap(),
            "\"movies\""
        );
    }

    #[test]
    fn test_quality_ladder_ordering() {
        assert!(Quality::Uhd8k > Quality::Uhd4k);
        assert!(Quality::Uhd4k > Quality::P1080);
        assert!(Quality::P1080 > Quality::P720);
        assert!(Quality::P360 > Quality::Unknown);
        assert!(Codec::H265 > Codec::H264);
        assert!(Codec::Vp9 > Codec::Unknown);
        assert!(Source::BluRay > Source::WebDl);
        assert!(Source::Cam > Source::Unknown);
    }

    #[test]
    fn test_quality_matches_requested_label() {
        assert!(Quality::P1080.matches("1080p"));
        assert!(Quality::P1080.matches("1080P"));
        assert!(Quality::P720.matches("any"));
        assert!(Quality::Uhd4k.matches("2160p"));
        assert!(Quality::Uhd4k.matches("4k"));
        assert!(!Quality::P720.matches("1080p"));
    }

    #[test]
    fn test_normalized_result_serializes_labels() {
        let result = NormalizedResult {
            candidate: TorrentCandidate {
                title: "Movie.1080p".to_string(),
                magnet_uri: "magnet:?xt=urn:btih:abc".to_string(),
                size_bytes: 10,
                seeds: 5,
                peers: 1,
                provider: "test".to_string(),
            },
            info_hash: None,
            quality: Quality::P1080,
            resolution: Some(Resolution::Fhd),
            codec: Codec::H264,
            source: Source::BluRay,
            language: "English".to_string(),
            is_repack: false,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["title"], "Movie.1080p");
        assert_eq!(json["quality"], "1080p");
        assert_eq!(json["resolution"], "FHD");
        assert_eq!(json["codec"], "H.264");
        assert_eq!(json["source"], "Blu-ray");
        assert!(json.get("info_hash").is_none());
    }

    #[test]
    fn test_info_hash_from_hex_magnet() {
        let magnet = "magnet:?xt=urn:btih:C9E15763F722F23E98A29DECDFAE341B98D53056&dn=Test";
        assert_eq!(
            info_hash_from_magnet(magnet).as_deref(),
            Some("c9e15763f722f23e98a29decdfae341b98d53056")
        );
    }

    #[test]
    fn test_info_hash_from_base32_magnet() {
        // base32 of 20 zero bytes
        let magnet = "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        assert_eq!(
            info_hash_from_magnet(magnet).as_deref(),
            Some("0000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn test_info_hash_from_invalid_magnet() {
        assert!(info_hash_from_magnet("https://example.com").is_none());
        assert!(info_hash_from_magnet("magnet:?dn=NoHash").is_none());
        assert!(info_hash_from_magnet("magnet:?xt=urn:btih:short").is_none());
    }

    #[test]
    fn test_identity_key_prefers_info_hash() {
        let mut result = NormalizedResult {
            candidate: TorrentCandidate {
                title: "x".to_string(),
                magnet_uri: " magnet:?xt=urn:btih:zzz ".to_string(),
                size_bytes: 0,
                seeds: 0,
                peers: 0,
                provider: "p".to_string(),
            },
            info_hash: None,
            quality: Quality::Unknown,
            resolution: None,
            codec: Codec::Unknown,
            source: Source::Unknown,
            language: "English".to_string(),
            is_repack: false,
        };
        assert_eq!(result.identity_key(), "magnet:?xt=urn:btih:zzz");

        result.info_hash = Some("abc".to_string());
        assert_eq!(result.identity_key(), "abc");
    }
}
