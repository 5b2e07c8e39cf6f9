use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Provider fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Per-provider timeout in seconds (default: 15)
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Result limit applied when a query does not carry one (default: 20)
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Registered providers, queried in this order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout(),
            default_limit: default_limit(),
            providers: Vec::new(),
        }
    }
}

fn default_provider_timeout() -> u64 {
    15
}

fn default_limit() -> u32 {
    20
}

/// A single provider entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Jackett(JackettConfig),
    Eztv(EztvConfig),
    TorrentsApi(TorrentsApiConfig),
}

impl ProviderConfig {
    /// Name the provider is registered and logged under.
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::Jackett(c) => &c.name,
            ProviderConfig::Eztv(c) => &c.name,
            ProviderConfig::TorrentsApi(c) => &c.name,
        }
    }

    pub fn rate_limit_rpm(&self) -> Option<u32> {
        match self {
            ProviderConfig::Jackett(c) => c.rate_limit_rpm,
            ProviderConfig::Eztv(c) => c.rate_limit_rpm,
            ProviderConfig::TorrentsApi(c) => c.rate_limit_rpm,
        }
    }
}

/// One Jackett indexer exposed as a provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    pub name: String,
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Indexer id inside Jackett ("all" queries every configured indexer)
    #[serde(default = "default_jackett_indexer")]
    pub indexer: String,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
}

fn default_jackett_indexer() -> String {
    "all".to_string()
}

/// EZTV API (TV only, looked up by IMDb id)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EztvConfig {
    #[serde(default = "default_eztv_name")]
    pub name: String,
    #[serde(default = "default_eztv_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
}

fn default_eztv_name() -> String {
    "EZTV".to_string()
}

fn default_eztv_url() -> String {
    "https://eztv.re".to_string()
}

/// Torrents-API free-text search
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentsApiConfig {
    #[serde(default = "default_torrents_api_name")]
    pub name: String,
    #[serde(default = "default_torrents_api_url")]
    pub url: String,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
}

fn default_torrents_api_name() -> String {
    "Torrents-API".to_string()
}

fn default_torrents_api_url() -> String {
    "https://torrents-api.xyz".to_string()
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds (default: 1 hour)
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// How often expired entries are purged in the background
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    600
}

/// Download orchestration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Parent of every `<session id>` directory.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// How often a running transfer's counters are sampled (milliseconds).
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,
    /// Upper bound on metadata resolution when adding a magnet.
    #[serde(default = "default_add_timeout")]
    pub add_timeout_secs: u64,
    /// Period of the cleanup reaper.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
    /// File extensions accepted as playable media (without the dot).
    #[serde(default = "default_playable_extensions")]
    pub playable_extensions: Vec<String>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            sample_interval_ms: default_sample_interval(),
            add_timeout_secs: default_add_timeout(),
            reaper_interval_secs: default_reaper_interval(),
            playable_extensions: default_playable_extensions(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_sample_interval() -> u64 {
    1000
}

fn default_add_timeout() -> u64 {
    60
}

fn default_reaper_interval() -> u64 {
    3600
}

fn default_playable_extensions() -> Vec<String> {
    ["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Embedded librqbit session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_enable_dht")]
    pub enable_dht: bool,
    #[serde(default)]
    pub listen_port: Option<u16>,
    /// Where librqbit keeps its session state (disabled when unset).
    #[serde(default)]
    pub persistence_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_dht: default_enable_dht(),
            listen_port: None,
            persistence_path: None,
        }
    }
}

fn default_enable_dht() -> bool {
    true
}

/// Sanitized config for diagnostics (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub logging: LoggingConfig,
    pub search: SanitizedSearchConfig,
    pub cache: CacheConfig,
    pub downloads: DownloadsConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub provider_timeout_secs: u64,
    pub default_limit: u32,
    pub providers: Vec<SanitizedProviderConfig>,
}

/// Provider entry with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub kind: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_rpm: Option<u32>,
}

impl From<&ProviderConfig> for SanitizedProviderConfig {
    fn from(provider: &ProviderConfig) -> Self {
        match provider {
            ProviderConfig::Jackett(j) => Self {
                kind: "jackett".to_string(),
                name: j.name.clone(),
                url: j.url.clone(),
                api_key_configured: Some(!j.api_key.is_empty()),
                rate_limit_rpm: j.rate_limit_rpm,
            },
            ProviderConfig::Eztv(e) => Self {
                kind: "eztv".to_string(),
                name: e.name.clone(),
                url: e.url.clone(),
                api_key_configured: None,
                rate_limit_rpm: e.rate_limit_rpm,
            },
            ProviderConfig::TorrentsApi(t) => Self {
                kind: "torrents_api".to_string(),
                name: t.name.clone(),
                url: t.url.clone(),
                api_key_configured: None,
                rate_limit_rpm: t.rate_limit_rpm,
            },
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            logging: config.logging.clone(),
            search: SanitizedSearchConfig {
                provider_timeout_secs: config.search.provider_timeout_secs,
                default_limit: config.search.default_limit,
                providers: config
                    .search
                    .providers
                    .iter()
                    .map(SanitizedProviderConfig::from)
                    .collect(),
            },
            cache: config.cache.clone(),
            downloads: config.downloads.clone(),
            engine: config.engine.clone(),
        }
    }
}
