//! moka-backed [`ResultCache`] with a capacity bound and entry TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use doclib_core::cache::{CacheKey, ResultCache};
use doclib_core::service::SearchResponse;

use crate::config::SearchConfig;

#[derive(Clone)]
pub struct MokaCache {
    cache: Cache<CacheKey, Arc<SearchResponse>>,
}

impl MokaCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl())
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl ResultCache for MokaCache {
    async fn get(&self, key: &CacheKey) -> Option<Arc<SearchResponse>> {
        self.cache.get(key).await
    }

    async fn put(&self, key: CacheKey, response: Arc<SearchResponse>) {
        self.cache.insert(key, response).await;
    }

    async fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doclib_core::service::PreviewResponse;

    fn key(generation: u64) -> CacheKey {
        CacheKey {
            generation,
            request: r#"{"preview":true}"#.to_string(),
        }
    }

    fn response() -> Arc<SearchResponse> {
        Arc::new(SearchResponse::Preview(PreviewResponse {
            n_items: 3,
            other_instances: Default::default(),
            search_text: None,
        }))
    }

    #[tokio::test]
    async fn test_get_put() {
        let cache = MokaCache::new(16, Duration::from_secs(60));
        assert!(cache.get(&key(1)).await.is_none());
        cache.put(key(1), response()).await;
        assert_eq!(cache.get(&key(1)).await, Some(response()));
        assert!(cache.get(&key(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_entries() {
        let cache = MokaCache::new(16, Duration::from_secs(60));
        cache.put(key(1), response()).await;
        cache.invalidate().await;
        assert!(cache.get(&key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MokaCache::new(16, Duration::from_millis(50));
        cache.put(key(1), response()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&key(1)).await.is_none());
    }
}
