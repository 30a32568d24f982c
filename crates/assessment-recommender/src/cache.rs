/// Redis caching layer for the recommender.
///
/// All operations return `Option<T>` for graceful degradation. If Redis is unavailable,
/// callers fall through to compute from source.
///
/// Key schema (namespaced to avoid collisions):
/// - `asr:v1:search:{sha256(query|limit)}`: JSON-serialized Vec<AssessmentRecord> (TTL: 3600s)
/// - `asr:v1:catalog_digest`: digest of the catalog and model the index was built from (no TTL)
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::model::AssessmentRecord;
use assessment_common::redis::RedisCache;

const KEY_PREFIX: &str = "asr:v1:";
const SEARCH_TTL_SECS: u64 = 3600;

/// What the embedding index needs from a cache.
#[async_trait]
pub trait IndexCache: Send + Sync {
    async fn get_search_results(&self, query: &str, limit: usize) -> Option<Vec<AssessmentRecord>>;

    async fn set_search_results(&self, query: &str, limit: usize, results: &[AssessmentRecord]);

    /// Digest recorded when the index was last populated.
    async fn get_catalog_digest(&self) -> Option<String>;

    async fn set_catalog_digest(&self, digest: &str);

    /// Delete all cached data. Used when the index is rebuilt.
    async fn invalidate_all(&self);
}

pub struct AssessmentCache {
    redis: RedisCache,
}

impl AssessmentCache {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    pub fn disabled() -> Self {
        Self::new(RedisCache::disabled())
    }
}

#[async_trait]
impl IndexCache for AssessmentCache {
    // --- Search results ---

    async fn get_search_results(&self, query: &str, limit: usize) -> Option<Vec<AssessmentRecord>> {
        let key = search_key(query, limit);
        let json = self.redis.get(&key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    async fn set_search_results(&self, query: &str, limit: usize, results: &[AssessmentRecord]) {
        let key = search_key(query, limit);
        if let Ok(json) = serde_json::to_string(results) {
            self.redis.set_with_ttl(&key, &json, SEARCH_TTL_SECS).await;
        }
    }

    // --- Catalog digest ---

    async fn get_catalog_digest(&self) -> Option<String> {
        let key = format!("{KEY_PREFIX}catalog_digest");
        self.redis.get(&key).await
    }

    async fn set_catalog_digest(&self, digest: &str) {
        let key = format!("{KEY_PREFIX}catalog_digest");
        self.redis.set(&key, digest).await;
    }

    // --- Invalidation ---

    async fn invalidate_all(&self) {
        self.redis.delete_by_prefix(KEY_PREFIX).await;
    }
}

/// Compute a deterministic cache key for a search query using SHA-256.
fn search_key(query: &str, limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update(b"|");
    hasher.update(limit.to_string().as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}search:{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_is_stable_and_limit_sensitive() {
        let a = search_key("java developer", 15);
        assert_eq!(a, search_key("java developer", 15));
        assert_ne!(a, search_key("java developer", 20));
        assert!(a.starts_with("asr:v1:search:"));
        assert_eq!(a.len(), "asr:v1:search:".len() + 64);
    }

    #[tokio::test]
    async fn test_disabled_cache_misses() {
        let cache = AssessmentCache::disabled();
        cache.set_search_results("q", 5, &[]).await;
        assert!(cache.get_search_results("q", 5).await.is_none());
        cache.set_catalog_digest("abc").await;
        assert!(cache.get_catalog_digest().await.is_none());
    }
}
