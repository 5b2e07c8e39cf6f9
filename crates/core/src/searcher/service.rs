//! Cache-first search entry point.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics;

use super::cache::ResultCache;
use super::coordinator::DegradedProvider;
use super::fallback::{FallbackSearcher, NoResultsError};
use super::{NormalizedResult, SearchQuery};

/// Errors returned by [`SearchService::search`].
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    NoResults(#[from] NoResultsError),

    #[error("Search query is empty")]
    EmptyQuery,
}

/// Results of one search call.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<NormalizedResult>,
    /// Served from the result cache without any provider call.
    pub from_cache: bool,
    /// Query text that produced the results.
    pub query_used: String,
    /// Every query tried; empty for cache hits.
    pub queries_attempted: Vec<String>,
    pub degraded_providers: Vec<DegradedProvider>,
    pub duration_ms: u64,
}

/// Cache lookup, then fan-out with fallback, then cache populate.
pub struct SearchService {
    cache: Arc<ResultCache>,
    fallback: FallbackSearcher,
    default_limit: u32,
}

impl SearchService {
    pub fn new(cache: Arc<ResultCache>, fallback: FallbackSearcher, default_limit: u32) -> Self {
        Self {
            cache,
            fallback,
            default_limit,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        if query.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let started = Instant::now();
        let limit = query
            .limit
            .or(Some(self.default_limit))
            .filter(|l| *l > 0)
            .map(|l| l as usize);
        // The cache holds the full result list; the limit is applied per call.
        let mut query = query.clone();
        query.limit = None;

        if let Some(mut results) = self.cache.get(&query).await {
            truncate(&mut results, limit);
            debug!(query = %query.query, category = %query.category, "Serving search from cache");
            metrics::SEARCH_DURATION
                .with_label_values(&["cache"])
                .observe(started.elapsed().as_secs_f64());
            metrics::SEARCH_RESULTS
                .with_label_values(&[])
                .observe(results.len() as f64);
            return Ok(SearchResponse {
                results,
                from_cache: true,
                query_used: query.query.clone(),
                queries_attempted: Vec::new(),
                degraded_providers: Vec::new(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        let outcome = self.fallback.search(&query).await;
        metrics::SEARCH_DURATION
            .with_label_values(&["providers"])
            .observe(started.elapsed().as_secs_f64());
        let mut outcome = outcome?;

        // Keyed by the caller's query, not the reformulation that hit.
        self.cache.put(&query, outcome.results.clone()).await;
        truncate(&mut outcome.results, limit);

        metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(outcome.results.len() as f64);
        info!(
            query = %query.query,
            category = %query.category,
            results = outcome.results.len(),
            degraded = outcome.degraded.len(),
            "Search complete"
        );

        Ok(SearchResponse {
            results: outcome.results,
            from_cache: false,
            query_used: outcome.query_used,
            queries_attempted: outcome.queries_attempted,
            degraded_providers: outcome.degraded,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn truncate(results: &mut Vec<NormalizedResult>, limit: Option<usize>) {
    if let Some(limit) = limit {
        results.truncate(limit);
    }
}

/// Pick the best-seeded result matching a requested quality.
///
/// Results with no seeds are never chosen. `"any"` accepts every quality.
pub fn select_best<'a>(
    results: &'a [NormalizedResult],
    quality: &str,
) -> Option<&'a NormalizedResult> {
    results
        .iter()
        .filter(|r| r.candidate.seeds > 0 && r.quality.matches(quality))
        .max_by_key(|r| r.candidate.seeds)
}
