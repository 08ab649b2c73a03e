//! Search Coordinator Agent (SPEC_FULL.md §4.8).

use std::sync::Arc;

use crate::cache::SearchResultCache;
use crate::search::ProviderFactory;
use crate::types::{ExpandedQuery, SearchDepth, SearchQuery, SearchResult};

pub struct SearchCoordinatorAgent {
    factory: Arc<ProviderFactory>,
    cache: Arc<SearchResultCache>,
    max_parallel_searches: usize,
}

impl SearchCoordinatorAgent {
    pub fn new(factory: Arc<ProviderFactory>, cache: Arc<SearchResultCache>, max_parallel_searches: usize) -> Self {
        Self { factory, cache, max_parallel_searches }
    }

    fn to_search_query(eq: &ExpandedQuery, max_results: usize) -> SearchQuery {
        SearchQuery::from_expanded(eq, max_results, SearchDepth::Basic)
    }

    /// Converts planned queries into `SearchQuery`s, picks a provider per
    /// query via the factory, runs `searchBatch` bounded by
    /// `maxParallelSearches`, and reduces to a de-duplicated ordered URL
    /// list. A cache hit sidesteps the provider entirely (SPEC_FULL.md §9).
    pub async fn coordinate(&self, expanded_queries: &[ExpandedQuery], max_results_per_query: usize) -> (Vec<SearchResult>, Vec<String>) {
        // Group by the provider the factory selects for each query's search type
        // so same-provider queries can share one `searchBatch` call.
        use std::collections::HashMap;
        let mut by_provider: HashMap<String, Vec<SearchQuery>> = HashMap::new();

        for eq in expanded_queries {
            let Ok(provider) = self.factory.select_for_type(eq.search_type) else { continue };
            by_provider.entry(provider.provider_id().to_string()).or_default().push(Self::to_search_query(eq, max_results_per_query));
        }

        let mut results = Vec::new();
        for (provider_id, queries) in by_provider {
            let Ok(provider) = self.factory.get(&provider_id) else { continue };

            let mut to_fetch = Vec::new();
            let mut cached = Vec::new();
            for q in &queries {
                let key = SearchResultCache::generate_key(q);
                match self.cache.try_get(&key).await {
                    Some(hit) => cached.push(hit),
                    None => to_fetch.push((key, q.clone())),
                }
            }

            results.extend(cached);

            for chunk in to_fetch.chunks(self.max_parallel_searches.max(1)) {
                let queries_only: Vec<SearchQuery> = chunk.iter().map(|(_, q)| q.clone()).collect();
                let fetched = provider.search_batch(&queries_only).await;
                for ((key, _), result) in chunk.iter().zip(fetched.into_iter()) {
                    self.cache.set(key.clone(), result.clone()).await;
                    results.push(result);
                }
            }
        }

        let urls = dedupe_urls(&results);
        (results, urls)
    }
}

fn dedupe_urls(results: &[SearchResult]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for result in results {
        for source in &result.sources {
            if seen.insert(source.url.clone()) {
                out.push(source.url.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchDepth, SearchSource, SearchType};

    fn query(text: &str) -> SearchQuery {
        SearchQuery { text: text.to_string(), search_type: SearchType::Web, depth: SearchDepth::Basic, max_results: 10, include_raw_content: false, include_domains: vec![], exclude_domains: vec![] }
    }

    #[test]
    fn dedupe_urls_preserves_first_occurrence_order() {
        let r1 = SearchResult {
            query: query("a"),
            provider: "tavily".to_string(),
            answer: None,
            sources: vec![
                SearchSource { url: "https://a.com".to_string(), title: String::new(), snippet: String::new(), raw_content: None, score: 1.0, published_date: None },
                SearchSource { url: "https://b.com".to_string(), title: String::new(), snippet: String::new(), raw_content: None, score: 1.0, published_date: None },
            ],
            timestamp: chrono::Utc::now(),
        };
        let r2 = SearchResult {
            query: query("b"),
            provider: "tavily".to_string(),
            answer: None,
            sources: vec![SearchSource { url: "https://a.com".to_string(), title: String::new(), snippet: String::new(), raw_content: None, score: 1.0, published_date: None }],
            timestamp: chrono::Utc::now(),
        };
        let urls = dedupe_urls(&[r1, r2]);
        assert_eq!(urls, vec!["https://a.com".to_string(), "https://b.com".to_string()]);
    }
}
