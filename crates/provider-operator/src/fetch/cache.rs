//! In-memory cache of fetched component manifests, keyed by the fetch
//! source identity and resolved version. Guarded by a `tokio::sync::RwLock`
//! so concurrent reconciles of different providers can read the cache
//! without blocking on each other; writes (on a cache miss) take the write
//! half only long enough to insert.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The rendered manifest bundle for one provider version: the raw YAML
/// documents and the metadata that accompanied them.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub version: String,
    pub documents: Vec<String>,
    pub metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub version: String,
}

#[derive(Default)]
pub struct FetchCache {
    entries: RwLock<HashMap<CacheKey, Arc<Artifact>>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Artifact>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, artifact: Artifact) -> Arc<Artifact> {
        let artifact = Arc::new(artifact);
        self.entries.write().await.insert(key, artifact.clone());
        artifact
    }

    pub async fn evict(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(source: &str, version: &str) -> CacheKey {
        CacheKey { source: source.to_string(), version: version.to_string() }
    }

    #[tokio::test]
    async fn miss_then_insert_then_hit() {
        let cache = FetchCache::new();
        assert!(cache.get(&key("a", "v1")).await.is_none());
        cache
            .insert(key("a", "v1"), Artifact { version: "v1".into(), documents: vec![], metadata: None })
            .await;
        assert!(cache.get(&key("a", "v1")).await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn evict_removes_entry() {
        let cache = FetchCache::new();
        cache
            .insert(key("a", "v1"), Artifact { version: "v1".into(), documents: vec![], metadata: None })
            .await;
        cache.evict(&key("a", "v1")).await;
        assert!(cache.get(&key("a", "v1")).await.is_none());
    }
}
