//! Service assembly and lifecycle.
//!
//! [`SeedScout`] wires the search side (providers, fan-out, fallback, cache)
//! and the download side (engine, session store, orchestrator, reaper)
//! together and owns the background loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{validate_config, Config, ConfigError};
use crate::downloads::{CleanupReaper, DownloadOrchestrator, InMemorySessionStore, SessionStore};
use crate::engine::{EngineError, LibrqbitEngine, TorrentEngine};
use crate::searcher::providers::build_provider;
use crate::searcher::{
    FallbackSearcher, FanOutSearcher, ProviderError, ResultCache, SearchService, TorrentProvider,
};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build provider: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Snapshot of the running service.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub running: bool,
    pub providers: Vec<String>,
    pub active_downloads: usize,
    pub cached_queries: usize,
}

/// The assembled discovery and download service.
pub struct SeedScout {
    search: Arc<SearchService>,
    downloads: Arc<DownloadOrchestrator>,
    reaper: Arc<CleanupReaper>,
    engine: Arc<dyn TorrentEngine>,
    cache: Arc<ResultCache>,
    provider_names: Vec<String>,
    cache_sweep_interval: Duration,
    reaper_interval: Duration,

    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SeedScout {
    /// Validate `config`, build every provider and start the embedded
    /// librqbit engine.
    pub async fn from_config(config: &Config) -> Result<Self, RuntimeError> {
        validate_config(config)?;

        let timeout = Duration::from_secs(config.search.provider_timeout_secs);
        let providers = config
            .search
            .providers
            .iter()
            .map(|p| build_provider(p, timeout))
            .collect::<Result<Vec<_>, _>>()?;

        let engine: Arc<dyn TorrentEngine> =
            Arc::new(LibrqbitEngine::new(&config.engine, &config.downloads.root_dir).await?);

        Ok(Self::with_parts(
            config,
            providers,
            engine,
            Arc::new(InMemorySessionStore::new()),
        ))
    }

    /// Assemble the service around injected collaborators.
    pub fn with_parts(
        config: &Config,
        providers: Vec<Arc<dyn TorrentProvider>>,
        engine: Arc<dyn TorrentEngine>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let fan_out = Arc::new(FanOutSearcher::new(
            providers,
            Duration::from_secs(config.search.provider_timeout_secs),
        ));
        let provider_names = fan_out.provider_names();
        let cache = Arc::new(ResultCache::new(Duration::from_secs(config.cache.ttl_secs)));
        let search = Arc::new(SearchService::new(
            Arc::clone(&cache),
            FallbackSearcher::new(fan_out),
            config.search.default_limit,
        ));
        let downloads = Arc::new(DownloadOrchestrator::new(
            Arc::clone(&engine),
            store,
            config.downloads.clone(),
        ));
        let reaper = Arc::new(CleanupReaper::new(
            Arc::clone(&engine),
            downloads.owners().clone(),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            search,
            downloads,
            reaper,
            engine,
            cache,
            provider_names,
            cache_sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
            reaper_interval: Duration::from_secs(config.downloads.reaper_interval_secs),
            running: AtomicBool::new(false),
            shutdown_tx,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn search(&self) -> &Arc<SearchService> {
        &self.search
    }

    pub fn downloads(&self) -> &Arc<DownloadOrchestrator> {
        &self.downloads
    }

    pub fn reaper(&self) -> &Arc<CleanupReaper> {
        &self.reaper
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the cache sweeper and the cleanup reaper.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("SeedScout already running");
            return;
        }

        info!(
            providers = self.provider_names.len(),
            engine = %self.engine.name(),
            "Starting SeedScout"
        );

        let sweeper = self
            .cache
            .spawn_sweeper(self.cache_sweep_interval, self.shutdown_tx.subscribe());
        let reaper = Arc::clone(&self.reaper)
            .spawn(self.reaper_interval, self.shutdown_tx.subscribe());
        self.background.lock().await.extend([sweeper, reaper]);
    }

    /// Signal the background loops, abort download watchers and stop the engine.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("SeedScout not running");
            return;
        }

        info!("Stopping SeedScout");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.downloads.shutdown().await;
        self.engine.stop().await;
        info!("SeedScout stopped");
    }

    pub async fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            running: self.is_running(),
            providers: self.provider_names.clone(),
            active_downloads: self.downloads.active_count().await,
            cached_queries: self.cache.len().await,
        }
    }
}
