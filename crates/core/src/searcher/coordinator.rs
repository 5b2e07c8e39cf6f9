//! Concurrent fan-out over every registered provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics;

use super::classifier::normalize;
use super::dedup::deduplicate_results;
use super::{NormalizedResult, ProviderError, SearchQuery, TorrentProvider};

/// A provider that contributed nothing to one fan-out call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedProvider {
    pub provider: String,
    pub error: String,
}

/// Merged outcome of one fan-out call.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult {
    /// Classified, deduplicated results in provider registration order.
    pub results: Vec<NormalizedResult>,
    /// Providers that failed or timed out.
    pub degraded: Vec<DegradedProvider>,
    /// How many providers were actually asked.
    pub providers_queried: usize,
}

/// Scatter/gather search across providers.
///
/// Every provider call gets its own timeout, so the whole call is bounded
/// by the slowest provider's budget. A failing provider only shows up in
/// `degraded`; it never fails the search.
pub struct FanOutSearcher {
    providers: Vec<Arc<dyn TorrentProvider>>,
    provider_timeout: Duration,
}

impl FanOutSearcher {
    pub fn new(providers: Vec<Arc<dyn TorrentProvider>>, provider_timeout: Duration) -> Self {
        Self {
            providers,
            provider_timeout,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn search(&self, query: &SearchQuery) -> FanOutResult {
        let eligible: Vec<&Arc<dyn TorrentProvider>> = self
            .providers
            .iter()
            .filter(|p| p.supports(query.category))
            .collect();

        debug!(
            query = %query.query,
            category = %query.category,
            providers = eligible.len(),
            "Starting provider fan-out"
        );

        let timeout = self.provider_timeout;
        let calls = eligible.iter().map(|provider| {
            let provider = Arc::clone(provider);
            async move {
                let name = provider.name().to_string();
                let started = Instant::now();
                let outcome = match tokio::time::timeout(timeout, provider.search(query)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        provider: name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                metrics::PROVIDER_DURATION
                    .with_label_values(&[&name])
                    .observe(started.elapsed().as_secs_f64());
                (name, outcome)
            }
        });

        // join_all keeps input order, which is registration order
        let settled = futures::future::join_all(calls).await;

        let mut merged = Vec::new();
        let mut degraded = Vec::new();
        for (provider, outcome) in settled {
            match outcome {
                Ok(candidates) => {
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&[&provider, "success"])
                        .inc();
                    debug!(provider = %provider, results = candidates.len(), "Provider search complete");
                    merged.extend(candidates.into_iter().map(normalize));
                }
                Err(e) => {
                    let status = match e {
                        ProviderError::Timeout { .. } => "timeout",
                        _ => "error",
                    };
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&[&provider, status])
                        .inc();
                    warn!(provider = %provider, error = %e, "Provider search failed");
                    degraded.push(DegradedProvider {
                        provider,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut results = deduplicate_results(merged);
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            results.truncate(limit as usize);
        }

        FanOutResult {
            results,
            degraded,
            providers_queried: eligible.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::{Codec, Quality, SearchCategory, Source};
    use crate::testing::{fixtures, MockProvider};

    fn as_providers(mocks: &[Arc<MockProvider>]) -> Vec<Arc<dyn TorrentProvider>> {
        mocks
            .iter()
            .map(|m| Arc::clone(m) as Arc<dyn TorrentProvider>)
            .collect()
    }

    #[tokio::test]
    async fn test_two_providers_distinct_magnets() {
        let yts = Arc::new(MockProvider::new("yts"));
        yts.set_results(vec![fixtures::candidate(
            "Inception.2010.1080p.BluRay.x264",
            "yts",
            &fixtures::magnet('a'),
            500,
        )])
        .await;
        let tpb = Arc::new(MockProvider::new("tpb"));
        tpb.set_results(vec![fixtures::candidate(
            "Inception.2010.720p.WEB-DL",
            "tpb",
            &fixtures::magnet('b'),
            10,
        )])
        .await;

        let searcher = FanOutSearcher::new(as_providers(&[yts, tpb]), Duration::from_secs(5));
        let outcome = searcher
            .search(&SearchQuery::new("Inception 2010", SearchCategory::Movies))
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.degraded.is_empty());

        let first = &outcome.results[0];
        assert_eq!(first.quality, Quality::P1080);
        assert_eq!(first.codec, Codec::H264);
        assert_eq!(first.source, Source::BluRay);

        let second = &outcome.results[1];
        assert_eq!(second.quality, Quality::P720);
        assert_eq!(second.codec, Codec::Unknown);
        assert_eq!(second.source, Source::WebDl);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successful_results() {
        let broken_a = Arc::new(MockProvider::new("broken-a"));
        broken_a
            .fail_with(ProviderError::Network("connection refused".to_string()))
            .await;
        let healthy = Arc::new(MockProvider::new("healthy"));
        healthy
            .set_results(vec![fixtures::candidate(
                "Movie.1080p",
                "healthy",
                &fixtures::magnet('c'),
                3,
            )])
            .await;
        let broken_b = Arc::new(MockProvider::new("broken-b"));
        broken_b
            .fail_with(ProviderError::Parse("unexpected token".to_string()))
            .await;

        let searcher = FanOutSearcher::new(
            as_providers(&[broken_a, healthy, broken_b]),
            Duration::from_secs(5),
        );
        let outcome = searcher
            .search(&SearchQuery::new("Movie", SearchCategory::Movies))
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].candidate.provider, "healthy");
        let degraded: Vec<_> = outcome.degraded.iter().map(|d| d.provider.as_str()).collect();
        assert_eq!(degraded, vec!["broken-a", "broken-b"]);
        assert_eq!(outcome.providers_queried, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_independently() {
        let slow = Arc::new(MockProvider::new("slow"));
        slow.set_delay(Duration::from_secs(60)).await;
        slow.set_results(vec![fixtures::candidate(
            "Never.Arrives",
            "slow",
            &fixtures::magnet('d'),
            1,
        )])
        .await;
        let fast = Arc::new(MockProvider::new("fast"));
        fast.set_results(vec![fixtures::candidate(
            "Fast.720p",
            "fast",
            &fixtures::magnet('e'),
            1,
        )])
        .await;

        let searcher = FanOutSearcher::new(as_providers(&[slow, fast]), Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        let outcome = searcher
            .search(&SearchQuery::new("anything", SearchCategory::Movies))
            .await;

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].candidate.provider, "fast");
        assert_eq!(outcome.degraded.len(), 1);
        assert!(outcome.degraded[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_duplicate_magnet_keeps_first_registered_provider() {
        let magnet = fixtures::magnet('f');
        let first = Arc::new(MockProvider::new("first"));
        first
            .set_results(vec![fixtures::candidate("Same.1080p", "first", &magnet, 1)])
            .await;
        let second = Arc::new(MockProvider::new("second"));
        second
            .set_results(vec![fixtures::candidate("Same.1080p", "second", &magnet, 900)])
            .await;

        let searcher = FanOutSearcher::new(as_providers(&[first, second]), Duration::from_secs(5));
        let outcome = searcher
            .search(&SearchQuery::new("Same", SearchCategory::Movies))
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].candidate.provider, "first");
    }

    #[tokio::test]
    async fn test_limit_truncates_in_insertion_order() {
        let provider = Arc::new(MockProvider::new("p"));
        provider
            .set_results(vec![
                fixtures::candidate("A", "p", &fixtures::magnet('1'), 1),
                fixtures::candidate("B", "p", &fixtures::magnet('2'), 100),
                fixtures::candidate("C", "p", &fixtures::magnet('3'), 50),
            ])
            .await;

        let searcher = FanOutSearcher::new(as_providers(&[provider]), Duration::from_secs(5));
        let outcome = searcher
            .search(&SearchQuery::new("x", SearchCategory::Movies).with_limit(2))
            .await;

        let titles: Vec<_> = outcome
            .results
            .iter()
            .map(|r| r.candidate.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_unsupported_category_is_skipped_not_degraded() {
        let tv_only = Arc::new(MockProvider::new("tv-only").with_categories(&[SearchCategory::Tv]));
        tv_only
            .set_results(vec![fixtures::candidate("Show.S01", "tv-only", &fixtures::magnet('9'), 1)])
            .await;

        let searcher =
            FanOutSearcher::new(as_providers(&[Arc::clone(&tv_only)]), Duration::from_secs(5));
        let outcome = searcher
            .search(&SearchQuery::new("Movie", SearchCategory::Movies))
            .await;

        assert!(outcome.results.is_empty());
        assert!(outcome.degraded.is_empty());
        assert_eq!(outcome.providers_queried, 0);
        assert_eq!(tv_only.search_count().await, 0);
    }
}
