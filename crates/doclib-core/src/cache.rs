//! Result cache interface for [`SearchService`](crate::service::SearchService).
//!
//! Keys carry the store's ingestion generation, so a response computed
//! before an ingestion can never be returned after it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::service::SearchResponse;

/// Cache key: ingestion generation plus the serialized request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub generation: u64,
    pub request: String,
}

/// Pluggable response cache.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Arc<SearchResponse>>;

    async fn put(&self, key: CacheKey, response: Arc<SearchResponse>);

    /// Drop every entry.
    async fn invalidate(&self);
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl ResultCache for NoCache {
    async fn get(&self, _key: &CacheKey) -> Option<Arc<SearchResponse>> {
        None
    }

    async fn put(&self, _key: CacheKey, _response: Arc<SearchResponse>) {}

    async fn invalidate(&self) {}
}

/// Unbounded in-process cache holding a single generation.
///
/// Storing an entry for a newer generation evicts everything older.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Arc<SearchResponse>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Arc<SearchResponse>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn put(&self, key: CacheKey, response: Arc<SearchResponse>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|k, _| k.generation >= key.generation);
        entries.insert(key, response);
    }

    async fn invalidate(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
