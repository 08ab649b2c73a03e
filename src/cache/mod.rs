//! Search Result Cache (SPEC_FULL.md §4.1).
//!
//! Memoizes provider responses by a canonical fingerprint of the query's
//! fingerprint-contributing fields. Built over `moka::future::Cache`, the
//! way the teacher layers its own scrape/search response caches.

use std::time::Duration;

use moka::future::Cache;
use sha2::{Digest, Sha256};

use crate::types::{SearchQuery, SearchResult};

const TTL: Duration = Duration::from_secs(60 * 60);
const TTI: Duration = Duration::from_secs(15 * 60);

pub struct SearchResultCache {
    inner: Cache<String, SearchResult>,
}

impl SearchResultCache {
    pub fn new() -> Self {
        let inner = Cache::builder().time_to_live(TTL).time_to_idle(TTI).build();
        Self { inner }
    }

    /// Deterministic fingerprint: query text (case-preserving), type, depth,
    /// max-results, and sorted include/exclude domain lists, SHA-256 hashed,
    /// first 16 hex chars, prefixed `search:`. Sorting the domain lists
    /// means list order never affects the key.
    pub fn generate_key(query: &SearchQuery) -> String {
        let mut include = query.include_domains.clone();
        let mut exclude = query.exclude_domains.clone();
        include.sort();
        exclude.sort();

        let canonical = format!(
            "{}|{:?}|{:?}|{}|{}|{}",
            query.text,
            query.search_type,
            query.depth,
            query.max_results,
            include.join(","),
            exclude.join(","),
        );

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        format!("search:{}", &hex[..16])
    }

    pub async fn try_get(&self, key: &str) -> Option<SearchResult> {
        self.inner.get(key).await
    }

    /// Only results with at least one source are cached — this avoids
    /// memoizing transient provider failures that returned empty.
    pub async fn set(&self, key: String, result: SearchResult) {
        if !result.sources.is_empty() {
            self.inner.insert(key, result).await;
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

impl Default for SearchResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchDepth, SearchType};

    fn query(text: &str, include: Vec<&str>, exclude: Vec<&str>) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            search_type: SearchType::Web,
            depth: SearchDepth::Basic,
            max_results: 10,
            include_raw_content: false,
            include_domains: include.into_iter().map(String::from).collect(),
            exclude_domains: exclude.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn equal_queries_produce_equal_keys() {
        let a = query("rust async runtimes", vec!["a.com", "b.com"], vec![]);
        let b = query("rust async runtimes", vec!["b.com", "a.com"], vec![]);
        assert_eq!(SearchResultCache::generate_key(&a), SearchResultCache::generate_key(&b));
    }

    #[test]
    fn differing_text_produces_different_keys() {
        let a = query("rust async runtimes", vec![], vec![]);
        let b = query("rust sync runtimes", vec![], vec![]);
        assert_ne!(SearchResultCache::generate_key(&a), SearchResultCache::generate_key(&b));
    }

    #[test]
    fn key_has_search_prefix_and_16_hex_chars() {
        let key = SearchResultCache::generate_key(&query("x", vec![], vec![]));
        assert!(key.starts_with("search:"));
        assert_eq!(key.len(), "search:".len() + 16);
    }

    #[tokio::test]
    async fn empty_results_are_not_cached() {
        let cache = SearchResultCache::new();
        let q = query("empty query", vec![], vec![]);
        let key = SearchResultCache::generate_key(&q);
        let result = SearchResult::empty(q, "tavily");
        cache.set(key.clone(), result).await;
        assert!(cache.try_get(&key).await.is_none());
    }
}
