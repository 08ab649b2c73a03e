//! Provider Factory (SPEC_FULL.md §4.3): case-insensitive id map with
//! capability-based fallback selection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResearchError;
use crate::types::SearchType;

use super::{SearchCapabilities, SearchProvider};

pub struct ProviderFactory {
    providers: HashMap<String, Arc<dyn SearchProvider>>,
    default_id: String,
}

impl ProviderFactory {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self { providers: HashMap::new(), default_id: default_id.into().to_lowercase() }
    }

    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.provider_id().to_lowercase(), provider);
    }

    pub fn get_default(&self) -> Result<Arc<dyn SearchProvider>, ResearchError> {
        self.get(&self.default_id)
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn SearchProvider>, ResearchError> {
        self.providers
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| ResearchError::ProviderNotFound(id.to_string(), self.available_ids().join(", ")))
    }

    /// Maps `searchType` to a required capability; prefers the default
    /// provider if it has that capability, otherwise the first provider
    /// that does, otherwise falls back to the default with a logged warning.
    pub fn select_for_type(&self, search_type: SearchType) -> Result<Arc<dyn SearchProvider>, ResearchError> {
        let required = SearchCapabilities::for_search_type(search_type);

        if let Ok(default) = self.get_default() {
            if default.capabilities().contains(required) {
                return Ok(default);
            }
        }

        if let Some(p) = self.providers.values().find(|p| p.capabilities().contains(required)) {
            return Ok(Arc::clone(p));
        }

        tracing::warn!(?search_type, "no provider has the required capability; falling back to default");
        self.get_default()
    }

    fn available_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::types::{SearchQuery, SearchResult};

    struct Stub {
        id: &'static str,
        caps: SearchCapabilities,
    }

    #[async_trait]
    impl SearchProvider for Stub {
        fn provider_id(&self) -> &str {
            self.id
        }
        fn capabilities(&self) -> SearchCapabilities {
            self.caps
        }
        async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ResearchError> {
            Ok(SearchResult::empty(query.clone(), self.id))
        }
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let mut factory = ProviderFactory::new("Tavily");
        factory.register(Arc::new(Stub { id: "tavily", caps: SearchCapabilities::WEB_SEARCH }));
        assert!(factory.get("TAVILY").is_ok());
        assert!(factory.get_default().is_ok());
    }

    #[test]
    fn unknown_id_lists_available_providers() {
        let mut factory = ProviderFactory::new("tavily");
        factory.register(Arc::new(Stub { id: "tavily", caps: SearchCapabilities::WEB_SEARCH }));
        let err = factory.get("nope").unwrap_err();
        assert!(matches!(err, ResearchError::ProviderNotFound(_, ref ids) if ids.contains("tavily")));
    }

    #[test]
    fn falls_back_to_first_capable_provider() {
        let mut factory = ProviderFactory::new("ddg");
        factory.register(Arc::new(Stub { id: "ddg", caps: SearchCapabilities::WEB_SEARCH }));
        factory.register(Arc::new(Stub { id: "tavily", caps: SearchCapabilities::WEB_SEARCH | SearchCapabilities::NEWS_SEARCH }));
        let provider = factory.select_for_type(SearchType::News).unwrap();
        assert_eq!(provider.provider_id(), "tavily");
    }
}
