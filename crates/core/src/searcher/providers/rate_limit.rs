//! Token bucket rate limiting for providers.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::searcher::{ProviderError, SearchCategory, SearchQuery, TorrentCandidate, TorrentProvider};

/// Token bucket for a single provider.
///
/// Tokens are added at a constant rate and consumed by requests. The
/// bucket starts full, allowing a burst up to the capacity.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, or return how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.capacity as u32
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Wraps a provider so that calls beyond its request budget fail fast
/// with [`ProviderError::RateLimited`] instead of hitting the network.
pub struct RateLimitedProvider<P> {
    inner: P,
    bucket: Mutex<TokenBucket>,
}

impl<P: TorrentProvider> RateLimitedProvider<P> {
    pub fn new(inner: P, requests_per_minute: u32) -> Self {
        Self {
            inner,
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: TorrentProvider> TorrentProvider for RateLimitedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports(&self, category: SearchCategory) -> bool {
        self.inner.supports(category)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<TorrentCandidate>, ProviderError> {
        let acquired = self.bucket.lock().await.try_acquire();
        if let Err(wait) = acquired {
            debug!(provider = %self.inner.name(), retry_after_ms = wait.as_millis() as u64, "Provider rate limited");
            return Err(ProviderError::RateLimited {
                provider: self.inner.name().to_string(),
                retry_after_ms: wait.as_millis() as u64,
            });
        }
        self.inner.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use std::sync::Arc;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10);
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert!((bucket.refill_rate - 10.0 / 60.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_rpm_is_clamped_to_one() {
        let bucket = TokenBucket::new(0);
        assert_eq!(bucket.requests_per_minute(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_drains_and_reports_wait() {
        let mut bucket = TokenBucket::new(10);
        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        let wait = bucket.try_acquire().unwrap_err();
        // At 10 rpm, 1 token takes 6 seconds to refill
        assert!(wait.as_secs_f32() <= 6.0);
        assert!(wait.as_millis() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(60); // 1 token per second
        for _ in 0..60 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_provider_fails_fast() {
        let mock = Arc::new(MockProvider::new("limited"));
        let provider = RateLimitedProvider::new(Arc::clone(&mock), 2);
        let query = SearchQuery::new("q", SearchCategory::Movies);

        tokio_test::assert_ok!(provider.search(&query).await);
        tokio_test::assert_ok!(provider.search(&query).await);
        let err = tokio_test::assert_err!(provider.search(&query).await);

        match err {
            ProviderError::RateLimited { provider, retry_after_ms } => {
                assert_eq!(provider, "limited");
                assert!(retry_after_ms > 0);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        // The third call never reached the inner provider
        assert_eq!(mock.search_count().await, 2);
        assert_eq!(provider.name(), "limited");
    }
}
