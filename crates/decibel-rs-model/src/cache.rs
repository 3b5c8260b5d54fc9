//! Result caching for model searches.
//!
//! Searches with caching enabled store their raw result rows under a
//! fingerprint of the compiled query. Cache entries are namespaced by the
//! searched model's qualified name so that invalidation can clear everything
//! affecting one model at once.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::executor::Row;

/// Stores search result rows keyed by query fingerprint.
///
/// Implementations must be cheap to consult: the search engine checks the
/// cache before every execution of a caching-enabled search.
pub trait ResultCache {
    /// Returns the cached rows for `key` in `namespace`, if present.
    fn get(&self, namespace: &str, key: &str) -> Option<Vec<Row>>;

    /// Stores rows for `key` in `namespace`, replacing any existing entry.
    fn set(&self, namespace: &str, key: &str, rows: Vec<Row>);

    /// Removes every entry in `namespace`.
    fn clear_namespace(&self, namespace: &str);
}

/// An in-memory [`ResultCache`] with no eviction.
///
/// Suitable for tests and single-process deployments. Interior mutability via
/// a mutex keeps the trait object usable behind a shared reference.
#[derive(Debug, Default)]
pub struct MemoryResultCache {
    entries: Mutex<HashMap<String, HashMap<String, Vec<Row>>>>,
}

impl MemoryResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries across all namespaces.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|map| map.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&self, namespace: &str, key: &str) -> Option<Vec<Row>> {
        self.entries
            .lock()
            .ok()
            .and_then(|map| map.get(namespace).and_then(|ns| ns.get(key).cloned()))
    }

    fn set(&self, namespace: &str, key: &str, rows: Vec<Row>) {
        if let Ok(mut map) = self.entries.lock() {
            map.entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), rows);
        }
    }

    fn clear_namespace(&self, namespace: &str) {
        if let Ok(mut map) = self.entries.lock() {
            map.remove(namespace);
        }
    }
}

/// A [`ResultCache`] that never stores anything.
///
/// Used when an application opts out of caching entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResultCache;

impl ResultCache for NullResultCache {
    fn get(&self, _namespace: &str, _key: &str) -> Option<Vec<Row>> {
        None
    }

    fn set(&self, _namespace: &str, _key: &str, _rows: Vec<Row>) {}

    fn clear_namespace(&self, _namespace: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample_rows() -> Vec<Row> {
        vec![Row::from_pairs([("id", Value::Int(1))])]
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryResultCache::new();
        assert!(cache.get("blog.Article", "abc").is_none());
        cache.set("blog.Article", "abc", sample_rows());
        assert_eq!(cache.get("blog.Article", "abc"), Some(sample_rows()));
    }

    #[test]
    fn test_memory_cache_namespace_isolation() {
        let cache = MemoryResultCache::new();
        cache.set("blog.Article", "abc", sample_rows());
        assert!(cache.get("blog.Comment", "abc").is_none());
    }

    #[test]
    fn test_memory_cache_clear_namespace() {
        let cache = MemoryResultCache::new();
        cache.set("blog.Article", "abc", sample_rows());
        cache.set("blog.Comment", "def", sample_rows());
        cache.clear_namespace("blog.Article");
        assert!(cache.get("blog.Article", "abc").is_none());
        assert_eq!(cache.get("blog.Comment", "def"), Some(sample_rows()));
    }

    #[test]
    fn test_memory_cache_overwrite() {
        let cache = MemoryResultCache::new();
        cache.set("blog.Article", "abc", sample_rows());
        let replacement = vec![Row::from_pairs([("id", Value::Int(2))])];
        cache.set("blog.Article", "abc", replacement.clone());
        assert_eq!(cache.get("blog.Article", "abc"), Some(replacement));
    }

    #[test]
    fn test_null_cache_stores_nothing() {
        let cache = NullResultCache;
        cache.set("blog.Article", "abc", sample_rows());
        assert!(cache.get("blog.Article", "abc").is_none());
    }
}
