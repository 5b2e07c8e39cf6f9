//! Time-bounded memo of search results.
//!
//! Entries are keyed by normalized query text and category. An entry past
//! its TTL is never returned; it is dropped on the lookup that finds it
//! (lazy invalidation) or by the periodic sweeper, whichever comes first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::metrics;

use super::{NormalizedResult, SearchCategory, SearchQuery};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    category: SearchCategory,
}

impl CacheKey {
    fn for_query(query: &SearchQuery) -> Self {
        Self {
            query: query
                .query
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            category: query.category,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    results: Vec<NormalizedResult>,
    created_at: Instant,
}

/// In-memory result cache with a fixed TTL.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached results for `query`, if present and younger than the TTL.
    pub async fn get(&self, query: &SearchQuery) -> Option<Vec<NormalizedResult>> {
        let key = CacheKey::for_query(query);

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.created_at.elapsed() < self.ttl => {
                    metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                    return Some(entry.results.clone());
                }
                Some(_) => {}
                None => {
                    metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                    return None;
                }
            }
        }

        // Expired: drop it unless a concurrent writer already refreshed it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(&key) {
            if entry.created_at.elapsed() < self.ttl {
                metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                return Some(entry.results.clone());
            }
            entries.remove(&key);
        }
        metrics::CACHE_LOOKUPS.with_label_values(&["expired"]).inc();
        debug!(query = %key.query, category = %key.category, "Cache entry expired");
        None
    }

    /// Store results for `query`. Empty result lists are not cached.
    pub async fn put(&self, query: &SearchQuery, results: Vec<NormalizedResult>) {
        if results.is_empty() {
            return;
        }
        let key = CacheKey::for_query(query);
        self.entries.write().await.insert(
            key,
            CacheEntry {
                results,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Spawn the periodic sweep. Runs until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Cache sweeper started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Cache sweeper received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let purged = cache.purge_expired().await;
                        if purged > 0 {
                            debug!(purged, "Purged expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
