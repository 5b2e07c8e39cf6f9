//! Mock torrent provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::searcher::{ProviderError, SearchCategory, SearchQuery, TorrentCandidate, TorrentProvider};

/// Produces results from the query text; `None` falls back to the configured results.
type QueryHandler = Box<dyn Fn(&str) -> Option<Vec<TorrentCandidate>> + Send + Sync>;

/// Mock implementation of the TorrentProvider trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable candidates, or derive them from the query text
/// - Track queries for assertions
/// - Simulate failures and slow responses
///
/// # Example
///
/// ```rust,ignore
/// use seedscout_core::testing::{fixtures, MockProvider};
///
/// let provider = Arc::new(MockProvider::new("yts"));
/// provider.set_results(vec![
///     fixtures::candidate("Inception.2010.1080p.BluRay", "yts", &fixtures::magnet('a'), 120),
/// ]).await;
///
/// let results = provider.search(&SearchQuery::new("Inception", SearchCategory::Movies)).await?;
/// assert_eq!(results.len(), 1);
/// assert_eq!(provider.search_count().await, 1);
/// ```
pub struct MockProvider {
    name: String,
    /// Categories this provider claims; `None` means all of them.
    categories: Option<Vec<SearchCategory>>,
    results: Arc<RwLock<Vec<TorrentCandidate>>>,
    /// Query text of every search, in call order.
    queries: Arc<RwLock<Vec<String>>>,
    /// Returned by every search until cleared.
    failure: Arc<RwLock<Option<ProviderError>>>,
    /// Returned by the next search only.
    next_error: Arc<RwLock<Option<ProviderError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("categories", &self.categories)
            .field("query_handler", &"<handler>")
            .finish_non_exhaustive()
    }
}

impl MockProvider {
    /// Create a mock provider with no results that supports every category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            categories: None,
            results: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            query_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Restrict the categories this provider reports as supported.
    pub fn with_categories(mut self, categories: &[SearchCategory]) -> Self {
        self.categories = Some(categories.to_vec());
        self
    }

    /// Set the candidates returned by subsequent searches.
    pub async fn set_results(&self, results: Vec<TorrentCandidate>) {
        *self.results.write().await = results;
    }

    pub async fn add_result(&self, result: TorrentCandidate) {
        self.results.write().await.push(result);
    }

    /// Fail every search with `error` until [`clear_failure`](Self::clear_failure).
    pub async fn fail_with(&self, error: ProviderError) {
        *self.failure.write().await = Some(error);
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Fail only the next search with `error`.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Sleep for `delay` before answering each search.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Derive results from the query text.
    ///
    /// The handler returns `Some(results)` to answer the query, or `None`
    /// to fall back to the configured results.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<TorrentCandidate>> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    /// Number of searches that reached this provider.
    pub async fn search_count(&self) -> usize {
        self.queries.read().await.len()
    }

    /// Query text of every search, in call order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl TorrentProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, category: SearchCategory) -> bool {
        self.categories
            .as_ref()
            .map(|categories| categories.contains(&category))
            .unwrap_or(true)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        self.queries.write().await.push(query.query.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }

        if let Some(handler) = self.query_handler.read().await.as_ref() {
            if let Some(results) = handler(&query.query) {
                return Ok(results);
            }
        }

        Ok(self.results.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_mock_provider_records_queries_and_errors() {
        let provider = MockProvider::new("mock");
        provider
            .set_results(vec![fixtures::candidate("A", "mock", &fixtures::magnet('a'), 1)])
            .await;
        provider
            .set_next_error(ProviderError::Api("boom".to_string()))
            .await;

        let query = SearchQuery::new("first", SearchCategory::Movies);
        assert!(provider.search(&query).await.is_err());
        let results = provider
            .search(&query.with_text("second"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(provider.recorded_queries().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_query_handler_falls_back_to_results() {
        let provider = MockProvider::new("mock");
        provider
            .set_results(vec![fixtures::candidate("Default", "mock", &fixtures::magnet('d'), 1)])
            .await;
        provider
            .set_query_handler(|q| (q == "empty").then(Vec::new))
            .await;

        let empty = provider
            .search(&SearchQuery::new("empty", SearchCategory::Tv))
            .await
            .unwrap();
        assert!(empty.is_empty());

        let other = provider
            .search(&SearchQuery::new("other", SearchCategory::Tv))
            .await
            .unwrap();
        assert_eq!(other[0].title, "Default");
    }

    #[test]
    fn test_with_categories() {
        let provider = MockProvider::new("tv").with_categories(&[SearchCategory::Tv]);
        assert!(provider.supports(SearchCategory::Tv));
        assert!(!provider.supports(SearchCategory::Movies));
        assert!(MockProvider::new("all").supports(SearchCategory::Anime));
    }
}
