//! Selective cache invalidation by store scope, cache name, or
//! content-matching pattern.

use crate::cache::ResponseCache;
use gqlclient_core::{CacheKey, GraphqlClientError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// The header carrying the store-view scoping label on cached entries.
const STORE_HEADER: &str = "Store";

/// The named caches of one client, built once at construction.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: HashMap<String, Arc<ResponseCache>>,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cache. Called only during client construction; caches are never
    /// created dynamically afterward.
    pub fn insert(&mut self, cache: ResponseCache) {
        self.caches
            .insert(cache.name().to_string(), Arc::new(cache));
    }

    /// Look up a cache by name.
    pub fn get(&self, name: &str) -> Option<&Arc<ResponseCache>> {
        self.caches.get(name)
    }

    /// Iterate over every cache.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResponseCache>> {
        self.caches.values()
    }

    /// Whether any cache is configured.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Number of configured caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Clear every cache. Used at shutdown.
    pub fn clear_all(&self) {
        for cache in self.caches.values() {
            cache.clear();
        }
    }

    /// Statistics for every cache.
    pub fn stats(&self) -> Vec<crate::cache::CacheStats> {
        self.caches.values().map(|c| c.stats()).collect()
    }
}

/// Removes cache entries by store scope, cache name, or body pattern.
pub struct CacheInvalidator {
    registry: Arc<CacheRegistry>,
}

impl CacheInvalidator {
    /// Create an invalidator over the client's cache registry.
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }

    /// Selectively remove cache entries.
    ///
    /// Dispatch, in priority order:
    /// 1. All three parameters empty/absent: clear every cache entirely.
    /// 2. Patterns non-empty (regardless of the other two): for each
    ///    non-blank pattern, compile it as a regular expression (a compile
    ///    failure propagates to the caller) and remove entries that carry
    ///    the store-view header AND whose serialized body matches.
    /// 3. Cache names without patterns: clear the named caches entirely when
    ///    no store view is given, otherwise remove only store-scoped entries
    ///    within them.
    /// 4. Store view alone: remove store-scoped entries in every cache.
    ///
    /// Entries lacking the `Store` header never match the store predicate,
    /// and an absent store view makes the predicate constantly false — so
    /// cache names plus patterns without a store view invalidate nothing.
    pub fn invalidate(
        &self,
        store_view: Option<&str>,
        cache_names: Option<&[String]>,
        patterns: Option<&[String]>,
    ) -> Result<()> {
        let store_view = store_view.filter(|s| !s.is_empty());
        let cache_names = cache_names.filter(|n| !n.is_empty());
        let patterns = patterns.filter(|p| !p.is_empty());

        match (store_view, cache_names, patterns) {
            (None, None, None) => {
                info!("Invalidating all caches");
                for cache in self.registry.iter() {
                    cache.clear();
                }
                Ok(())
            }
            (store_view, cache_names, Some(patterns)) => {
                self.invalidate_by_patterns(store_view, cache_names, patterns)
            }
            (store_view, Some(cache_names), None) => {
                for name in cache_names {
                    let Some(cache) = self.registry.get(name) else {
                        debug!(cache = %name, "Skipping unknown cache name");
                        continue;
                    };
                    match store_view {
                        None => {
                            info!(cache = %name, "Clearing cache");
                            cache.clear();
                        }
                        Some(view) => {
                            info!(cache = %name, store_view = %view, "Store-scoped invalidation");
                            cache.remove_matching(|key, _| has_store_header(key, Some(view)));
                        }
                    }
                }
                Ok(())
            }
            (Some(view), None, None) => {
                info!(store_view = %view, "Store-scoped invalidation across all caches");
                for cache in self.registry.iter() {
                    cache.remove_matching(|key, _| has_store_header(key, Some(view)));
                }
                Ok(())
            }
        }
    }

    fn invalidate_by_patterns(
        &self,
        store_view: Option<&str>,
        cache_names: Option<&[String]>,
        patterns: &[String],
    ) -> Result<()> {
        // Patterns are evaluated independently and sequentially; a compile
        // failure propagates as-is, even after earlier patterns have run.
        for pattern in patterns {
            if pattern.is_empty() {
                continue;
            }
            let regex = Regex::new(pattern)
                .map_err(|e| GraphqlClientError::pattern(pattern, e.to_string()))?;

            info!(
                pattern = %pattern,
                store_view = store_view.unwrap_or(""),
                "Pattern invalidation"
            );
            for cache in self.registry.iter() {
                if let Some(names) = cache_names {
                    if !names.iter().any(|n| n == cache.name()) {
                        continue;
                    }
                }
                cache.remove_matching(|key, body| {
                    has_store_header(key, store_view) && regex.is_match(body)
                });
            }
        }
        Ok(())
    }
}

/// Whether the entry's options carry a `Store` header equal to the given
/// store view, both compared case-insensitively. Defined to be false when no
/// store view is given.
fn has_store_header(key: &CacheKey, store_view: Option<&str>) -> bool {
    let Some(view) = store_view else {
        return false;
    };
    key.options()
        .header_value(STORE_HEADER)
        .is_some_and(|value| value.eq_ignore_ascii_case(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedResult;
    use gqlclient_core::{GraphqlRequest, RequestOptions};
    use std::time::Duration;

    fn entry_key(query: &str, store: Option<&str>) -> CacheKey {
        let mut options = RequestOptions::new();
        if let Some(store) = store {
            options = options.with_header("Store", store);
        }
        CacheKey::new(GraphqlRequest::new(query), options)
    }

    async fn seed(cache: &ResponseCache, key: &CacheKey, body: &str) {
        let body = body.to_string();
        cache
            .get_or_compute(key, || async move {
                Ok(CachedResult {
                    body,
                    duration_ms: 1,
                })
            })
            .await;
    }

    async fn registry_with_two_caches() -> Arc<CacheRegistry> {
        let mut registry = CacheRegistry::new();
        registry.insert(ResponseCache::new("cacheA", 10, Duration::from_secs(60)));
        registry.insert(ResponseCache::new("cacheB", 10, Duration::from_secs(60)));
        let registry = Arc::new(registry);

        let a = registry.get("cacheA").unwrap();
        seed(
            a,
            &entry_key("{p1}", Some("default")),
            r#"{"text": "sku1"}"#,
        )
        .await;
        seed(a, &entry_key("{p2}", Some("other")), r#"{"text": "sku2"}"#).await;

        let b = registry.get("cacheB").unwrap();
        seed(b, &entry_key("{p3}", None), r#"{"text": "sku3"}"#).await;

        registry
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator.invalidate(None, None, None).unwrap();

        assert!(registry.get("cacheA").unwrap().is_empty());
        assert!(registry.get("cacheB").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_scoped_invalidation() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator.invalidate(Some("default"), None, None).unwrap();

        // Only the entry tagged Store=default is removed; the Store=other
        // entry and the untagged entry survive.
        assert_eq!(registry.get("cacheA").unwrap().len(), 1);
        assert_eq!(registry.get("cacheB").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_header_comparison_is_case_insensitive() {
        let mut registry = CacheRegistry::new();
        registry.insert(ResponseCache::new("c", 10, Duration::from_secs(60)));
        let registry = Arc::new(registry);
        let cache = registry.get("c").unwrap();
        seed(
            cache,
            &entry_key(
                "{p}",
                Some("Default"),
            ),
            "{}",
        )
        .await;

        let invalidator = CacheInvalidator::new(Arc::clone(&registry));
        invalidator.invalidate(Some("DEFAULT"), None, None).unwrap();
        assert!(registry.get("c").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_names_without_store_view_clear_entirely() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator
            .invalidate(None, Some(&["cacheA".to_string()]), None)
            .unwrap();

        assert!(registry.get("cacheA").unwrap().is_empty());
        assert_eq!(registry.get("cacheB").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_names_with_store_view_scope_within() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator
            .invalidate(Some("other"), Some(&["cacheA".to_string()]), None)
            .unwrap();

        assert_eq!(registry.get("cacheA").unwrap().len(), 1);
        assert_eq!(registry.get("cacheB").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pattern_invalidation() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator
            .invalidate(
                Some("default"),
                None,
                Some(&["\"text\":\\s*\"(sku2)\"".to_string()]),
            )
            .unwrap();

        // sku2 is tagged Store=other, so the default-store pattern pass
        // leaves it alone; sku1 does not match the pattern.
        assert_eq!(registry.get("cacheA").unwrap().len(), 2);

        invalidator
            .invalidate(
                Some("default"),
                None,
                Some(&["\"text\":\\s*\"(sku1)\"".to_string()]),
            )
            .unwrap();
        assert_eq!(registry.get("cacheA").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_null_store_view_guard() {
        // Known consequence of the rule structure: cache names plus patterns
        // without a store view invalidate nothing, because the store
        // predicate never passes.
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator
            .invalidate(
                None,
                Some(&["cacheA".to_string()]),
                Some(&["sku".to_string()]),
            )
            .unwrap();

        assert_eq!(registry.get("cacheA").unwrap().len(), 2);
        assert_eq!(registry.get("cacheB").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern_propagates() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        let err = invalidator
            .invalidate(Some("default"), None, Some(&["(unclosed".to_string()]))
            .unwrap_err();
        assert!(matches!(err, GraphqlClientError::Pattern { .. }));
    }

    #[tokio::test]
    async fn test_blank_patterns_are_skipped() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        invalidator
            .invalidate(Some("default"), None, Some(&[String::new()]))
            .unwrap();

        assert_eq!(registry.get("cacheA").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_lists_behave_like_absent() {
        let registry = registry_with_two_caches().await;
        let invalidator = CacheInvalidator::new(Arc::clone(&registry));

        // Empty vectors are treated as absent, so this is invalidate-all.
        invalidator
            .invalidate(None, Some(&[]), Some(&[]))
            .unwrap();
        assert!(registry.get("cacheA").unwrap().is_empty());
        assert!(registry.get("cacheB").unwrap().is_empty());
    }
}
