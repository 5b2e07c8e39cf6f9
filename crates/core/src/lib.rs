pub mod config;
pub mod downloads;
pub mod engine;
pub mod metrics;
pub mod runtime;
pub mod searcher;
pub mod telemetry;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, CacheConfig, Config, ConfigError,
    DownloadsConfig, EngineConfig, LoggingConfig, ProviderConfig, SanitizedConfig, SearchConfig,
};
pub use downloads::{
    CleanupReaper, DownloadError, DownloadOrchestrator, DownloadStatus, DownloadTask,
    InMemorySessionStore, SessionStore, StartDownload, TaskFailure, TransferOwners,
};
pub use engine::{
    AddOptions, EngineError, LibrqbitEngine, TorrentEngine, TransferEvent, TransferFile,
    TransferHandle, TransferStats,
};
pub use runtime::{RuntimeError, RuntimeStatus, SeedScout};
pub use searcher::{
    select_best, NoResultsError, NormalizedResult, ProviderError, Quality, ResultCache,
    SearchCategory, SearchError, SearchQuery, SearchResponse, SearchService, TorrentCandidate,
    TorrentProvider,
};
pub use telemetry::{init_tracing, TelemetryError};
