//! Shared cache service
//!
//! Front door used by every provider. One bounded `moka` cache per source
//! tag (entry bound + per-source TTL); `try_get_with` gives single-flight:
//! concurrent demands for one missing key collapse to a single upstream
//! fetch and failed fetches are never cached. The optional file layer is
//! consulted on memory misses and written through on successful fetches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{CacheKey, FileCacheRepository};
use crate::application::errors::ProviderError;
use crate::config::CacheConfig;

type SourceCache = Cache<String, Arc<serde_json::Value>>;

pub struct CacheService {
    sources: Mutex<HashMap<String, SourceCache>>,
    negatives: Mutex<HashMap<String, Cache<String, ()>>>,
    disk: Option<FileCacheRepository>,
    config: CacheConfig,
}

impl CacheService {
    pub fn new(config: CacheConfig) -> Self {
        let disk = config.directory.as_ref().map(FileCacheRepository::new);
        Self {
            sources: Mutex::new(HashMap::new()),
            negatives: Mutex::new(HashMap::new()),
            disk,
            config,
        }
    }

    /// In-memory cache for tests and cache-free runs.
    pub fn in_memory() -> Self {
        Self::new(CacheConfig {
            directory: None,
            ..CacheConfig::default()
        })
    }

    fn ttl_for(&self, source: &str) -> u64 {
        self.config
            .source_ttl_seconds
            .get(source)
            .copied()
            .unwrap_or(self.config.ttl_seconds)
    }

    fn cache_for(&self, source: &str) -> SourceCache {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        sources
            .entry(source.to_string())
            .or_insert_with(|| {
                Cache::builder()
                    .max_capacity(self.config.max_entries_per_source)
                    .time_to_live(Duration::from_secs(self.ttl_for(source)))
                    .build()
            })
            .clone()
    }

    fn negative_cache_for(&self, source: &str) -> Option<Cache<String, ()>> {
        let ttl = self.config.negative_ttl_seconds?;
        let mut negatives = self.negatives.lock().unwrap_or_else(|e| e.into_inner());
        Some(
            negatives
                .entry(source.to_string())
                .or_insert_with(|| {
                    Cache::builder()
                        .max_capacity(self.config.max_entries_per_source)
                        .time_to_live(Duration::from_secs(ttl))
                        .build()
                })
                .clone(),
        )
    }

    /// Look up a cached value without fetching.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let cache = self.cache_for(&key.source);
        let rendered = key.render();
        if let Some(value) = cache.get(&rendered).await {
            return serde_json::from_value((*value).clone()).ok();
        }
        if let Some(disk) = &self.disk {
            if let Some(value) = disk.get(key, Utc::now()).await {
                let shared = Arc::new(value);
                cache.insert(rendered, shared.clone()).await;
                return serde_json::from_value((*shared).clone()).ok();
            }
        }
        None
    }

    /// Insert a freshly fetched value into both layers.
    pub async fn insert<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(error) => {
                warn!(key = %key.render(), %error, "failed to serialize cache payload");
                return;
            }
        };
        self.cache_for(&key.source)
            .insert(key.render(), Arc::new(json.clone()))
            .await;
        if let Some(disk) = &self.disk {
            if let Err(error) = disk.set(key, &json, self.ttl_for(&key.source), Utc::now()).await {
                warn!(key = %key.render(), %error, "failed to persist cache entry");
            }
        }
    }

    /// Fetch through the cache with single-flight semantics.
    ///
    /// At most one `fetch` runs per missing key; concurrent callers share its
    /// result. A failed fetch propagates to every waiter and leaves nothing
    /// cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let cache = self.cache_for(&key.source);
        let rendered = key.render();
        let outcome = cache
            .try_get_with(rendered, async {
                if let Some(disk) = &self.disk {
                    if let Some(value) = disk.get(key, Utc::now()).await {
                        return Ok(Arc::new(value));
                    }
                }
                let value = fetch().await?;
                let json = serde_json::to_value(&value)
                    .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                if let Some(disk) = &self.disk {
                    if let Err(error) =
                        disk.set(key, &json, self.ttl_for(&key.source), Utc::now()).await
                    {
                        warn!(key = %key.render(), %error, "failed to persist cache entry");
                    }
                }
                Ok::<_, ProviderError>(Arc::new(json))
            })
            .await;

        match outcome {
            Ok(value) => serde_json::from_value((*value).clone())
                .map_err(|e| ProviderError::Malformed(e.to_string())),
            Err(shared) => Err(shared.clone_for_waiters()),
        }
    }

    /// Record a "not found" answer. No-op unless negative caching is enabled.
    pub async fn remember_absent(&self, key: &CacheKey) {
        if let Some(cache) = self.negative_cache_for(&key.source) {
            cache.insert(key.render(), ()).await;
        }
    }

    /// Whether a "not found" answer is still remembered for this key.
    pub async fn is_known_absent(&self, key: &CacheKey) -> bool {
        match self.negative_cache_for(&key.source) {
            Some(cache) => cache.get(&key.render()).await.is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::Ecosystem;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn key(name: &str) -> CacheKey {
        CacheKey::new("test-source", Ecosystem::Npm, name, None)
    }

    #[tokio::test]
    async fn caches_successful_fetches() {
        let cache = CacheService::in_memory();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let value: u32 = cache
                .get_or_fetch(&key("pkg"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .await
                .expect("fetch");
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetches_are_not_cached() {
        let cache = CacheService::in_memory();
        let calls = AtomicU32::new(0);
        let first: Result<u32, _> = cache
            .get_or_fetch(&key("pkg"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Timeout { seconds: 5 })
            })
            .await;
        assert!(first.is_err());

        let second: u32 = cache
            .get_or_fetch(&key("pkg"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(9u32)
            })
            .await
            .expect("fetch");
        assert_eq!(second, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_collapse_to_one_fetch() {
        let cache = Arc::new(CacheService::in_memory());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(&key("hot"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(1u32)
                    })
                    .await
                    .expect("fetch")
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join"), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disk_layer_survives_memory_loss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };

        let first = CacheService::new(config.clone());
        first.insert(&key("persisted"), &42u32).await;

        // A fresh service with an empty memory layer hydrates from disk.
        let second = CacheService::new(config);
        let value: Option<u32> = second.get(&key("persisted")).await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn negative_caching_is_off_by_default() {
        let cache = CacheService::in_memory();
        cache.remember_absent(&key("missing")).await;
        assert!(!cache.is_known_absent(&key("missing")).await);
    }

    #[tokio::test]
    async fn negative_caching_can_be_enabled() {
        let cache = CacheService::new(CacheConfig {
            negative_ttl_seconds: Some(60),
            ..CacheConfig::default()
        });
        cache.remember_absent(&key("missing")).await;
        assert!(cache.is_known_absent(&key("missing")).await);
    }
}
