/*!
 * Response caching for oracle calls.
 *
 * Re-running a task over the same document pair sends byte-identical
 * requests; the cache answers those without another round-trip.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::{ModelSpec, Oracle, OracleRequest, OracleResponse};
use crate::errors::ProviderError;

/// SHA-256 of the model id and both prompt parts
fn cache_key(model: &ModelSpec, request: &OracleRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(request.system.as_bytes());
    hasher.update([0u8]);
    hasher.update(request.user.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory response store
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, OracleResponse>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<OracleResponse> {
        let found = self.entries.read().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn store(&self, key: String, response: OracleResponse) {
        self.entries.write().insert(key, response);
    }

    /// Get cache statistics: (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
        (hits, misses, rate)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Oracle decorator that memoises successful, untruncated responses
#[derive(Debug)]
pub struct CachedOracle {
    inner: Arc<dyn Oracle>,
    cache: Arc<ResponseCache>,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn Oracle>) -> Self {
        Self::with_cache(inner, Arc::new(ResponseCache::new()))
    }

    pub fn with_cache(inner: Arc<dyn Oracle>, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[async_trait]
impl Oracle for CachedOracle {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleResponse, ProviderError> {
        let key = cache_key(self.inner.model(), &request);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Oracle cache hit ({}…)", &key[..12]);
            return Ok(hit);
        }

        let response = self.inner.invoke(request).await?;
        if !response.truncated {
            self.cache.store(key, response.clone());
        }
        Ok(response)
    }

    fn model(&self) -> &ModelSpec {
        self.inner.model()
    }
}
