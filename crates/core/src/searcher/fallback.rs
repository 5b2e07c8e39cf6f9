//! Query reformulation when a fan-out comes back empty.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics;

use super::coordinator::{DegradedProvider, FanOutSearcher};
use super::{NormalizedResult, SearchCategory, SearchQuery};

/// Number of reformulations tried before giving up.
pub const FALLBACK_STEPS: usize = 5;

/// Every reformulation came back empty.
#[derive(Debug, Clone, Error, Serialize)]
#[error("No torrents found for {category} after {} queries", .queries_attempted.len())]
pub struct NoResultsError {
    /// Queries in the order they were tried.
    pub queries_attempted: Vec<String>,
    pub category: SearchCategory,
    /// Providers that failed during any of the attempts.
    pub degraded_providers: Vec<DegradedProvider>,
}

/// A successful fallback run.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub results: Vec<NormalizedResult>,
    /// The reformulation that produced `results`.
    pub query_used: String,
    /// Every query tried, ending with `query_used`.
    pub queries_attempted: Vec<String>,
    /// Providers that failed during the successful attempt.
    pub degraded: Vec<DegradedProvider>,
}

/// The fixed, ordered reformulation sequence for a query.
///
/// 1. original
/// 2. without the literal "TV series"
/// 3. without 4-digit year tokens
/// 4. cut at the first " TV"
/// 5. with " S01" appended
///
/// Whitespace is collapsed in every variant. The list always has five
/// entries, even when some of them are identical.
pub fn reformulate(text: &str) -> [String; FALLBACK_STEPS] {
    let original = collapse_whitespace(text);

    let without_series = collapse_whitespace(&original.replace("TV series", ""));

    let without_year = original
        .split_whitespace()
        .filter(|word| !is_year_token(word))
        .collect::<Vec<_>>()
        .join(" ");

    let before_tv = match original.find(" TV") {
        Some(idx) => collapse_whitespace(&original[..idx]),
        None => original.clone(),
    };

    let with_season = collapse_whitespace(&format!("{} S01", original));

    [original, without_series, without_year, before_tv, with_season]
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_year_token(word: &str) -> bool {
    word.len() == 4 && word.bytes().all(|b| b.is_ascii_digit())
}

/// Runs the fan-out once per reformulation until one yields results.
///
/// Providers are isolated per fan-out call: one that failed on an earlier
/// step is queried again on the next.
pub struct FallbackSearcher {
    fan_out: Arc<FanOutSearcher>,
}

impl FallbackSearcher {
    pub fn new(fan_out: Arc<FanOutSearcher>) -> Self {
        Self { fan_out }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<FallbackOutcome, NoResultsError> {
        let mut attempted = Vec::with_capacity(FALLBACK_STEPS);
        let mut all_degraded: Vec<DegradedProvider> = Vec::new();

        for text in reformulate(&query.query) {
            attempted.push(text.clone());
            debug!(attempt = attempted.len(), query = %text, "Trying query");

            let step = self.fan_out.search(&query.with_text(text.clone())).await;

            if !step.results.is_empty() {
                metrics::FALLBACK_ATTEMPTS
                    .with_label_values(&[])
                    .observe(attempted.len() as f64);
                if attempted.len() > 1 {
                    info!(
                        original = %query.query,
                        query_used = %text,
                        attempts = attempted.len(),
                        "Reformulated query found results"
                    );
                }
                return Ok(FallbackOutcome {
                    results: step.results,
                    query_used: text,
                    queries_attempted: attempted,
                    degraded: step.degraded,
                });
            }

            for degraded in step.degraded {
                if !all_degraded.iter().any(|d| d.provider == degraded.provider) {
                    all_degraded.push(degraded);
                }
            }
        }

        metrics::FALLBACK_ATTEMPTS
            .with_label_values(&[])
            .observe(attempted.len() as f64);
        info!(
            query = %query.query,
            category = %query.category,
            "No results after all reformulations"
        );

        Err(NoResultsError {
            queries_attempted: attempted,
            category: query.category,
            degraded_providers: all_degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::{ProviderError, TorrentProvider};
    use crate::testing::{fixtures, MockProvider};
    use std::time::Duration;

    fn fallback_over(provider: &Arc<MockProvider>) -> FallbackSearcher {
        let providers: Vec<Arc<dyn TorrentProvider>> =
            vec![Arc::clone(provider) as Arc<dyn TorrentProvider>];
        FallbackSearcher::new(Arc::new(FanOutSearcher::new(
            providers,
            Duration::from_secs(5),
        )))
    }

    #[test]
    fn test_reformulate_tv_series_query() {
        let variants = reformulate("Breaking Bad 2008 TV series");
        assert_eq!(
            variants,
            [
                "Breaking Bad 2008 TV series".to_string(),
                "Breaking Bad 2008".to_string(),
                "Breaking Bad TV series".to_string(),
                "Breaking Bad 2008".to_string(),
                "Breaking Bad 2008 TV series S01".to_string(),
            ]
        );
    }

    #[test]
    fn test_reformulate_plain_query_keeps_five_entries() {
        let variants = reformulate("Obscure Show S01");
        assert_eq!(variants.len(), FALLBACK_STEPS);
        assert_eq!(variants[0], "Obscure Show S01");
        assert_eq!(variants[1], "Obscure Show S01");
        assert_eq!(variants[2], "Obscure Show S01");
        assert_eq!(variants[3], "Obscure Show S01");
        assert_eq!(variants[4], "Obscure Show S01 S01");
    }

    #[test]
    fn test_reformulate_collapses_whitespace() {
        let variants = reformulate("  Inception   2010 ");
        assert_eq!(variants[0], "Inception 2010");
        assert_eq!(variants[2], "Inception");
    }

    #[test]
    fn test_year_token_detection() {
        assert!(is_year_token("1999"));
        assert!(!is_year_token("199"));
        assert!(!is_year_token("1080p"));
        assert!(!is_year_token("S2010"));
    }

    #[tokio::test]
    async fn test_first_query_with_results_wins() {
        let provider = Arc::new(MockProvider::new("p"));
        provider
            .set_results(vec![fixtures::candidate(
                "Inception.2010.1080p",
                "p",
                &fixtures::magnet('a'),
                10,
            )])
            .await;

        let outcome = fallback_over(&provider)
            .search(&SearchQuery::new("Inception 2010", SearchCategory::Movies))
            .await
            .unwrap();

        assert_eq!(outcome.query_used, "Inception 2010");
        assert_eq!(outcome.queries_attempted, vec!["Inception 2010"]);
        assert_eq!(provider.search_count().await, 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_non_empty_reformulation() {
        let provider = Arc::new(MockProvider::new("p"));
        provider
            .set_query_handler(|q| {
                if q == "Some Show TV series" {
                    Some(vec![fixtures::candidate(
                        "Some.Show.S01E01.720p",
                        "p",
                        &fixtures::magnet('b'),
                        5,
                    )])
                } else {
                    Some(Vec::new())
                }
            })
            .await;

        let outcome = fallback_over(&provider)
            .search(&SearchQuery::new("Some Show 2019 TV series", SearchCategory::Tv))
            .await
            .unwrap();

        assert_eq!(outcome.query_used, "Some Show TV series");
        assert_eq!(
            outcome.queries_attempted,
            vec!["Some Show 2019 TV series", "Some Show 2019", "Some Show TV series"]
        );
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_fallback_reports_every_query() {
        let provider = Arc::new(MockProvider::new("p"));

        let err = fallback_over(&provider)
            .search(&SearchQuery::new("Obscure Show S01", SearchCategory::Tv))
            .await
            .unwrap_err();

        assert_eq!(err.queries_attempted.len(), FALLBACK_STEPS);
        assert_eq!(err.queries_attempted, reformulate("Obscure Show S01").to_vec());
        assert_eq!(err.category, SearchCategory::Tv);
        assert_eq!(provider.search_count().await, FALLBACK_STEPS);
    }

    #[tokio::test]
    async fn test_failed_provider_is_retried_on_every_step() {
        let provider = Arc::new(MockProvider::new("flaky"));
        provider
            .fail_with(ProviderError::Network("down".to_string()))
            .await;

        let err = fallback_over(&provider)
            .search(&SearchQuery::new("Anything", SearchCategory::Movies))
            .await
            .unwrap_err();

        assert_eq!(provider.search_count().await, FALLBACK_STEPS);
        assert_eq!(err.degraded_providers.len(), 1);
        assert_eq!(err.degraded_providers[0].provider, "flaky");
    }
}
