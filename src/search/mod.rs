//! Search Providers (SPEC_FULL.md §4.2) and the Provider Factory (§4.3).

pub mod providers;

mod factory;
pub use factory::ProviderFactory;

use async_trait::async_trait;

use crate::error::ResearchError;
use crate::types::{SearchQuery, SearchResult, SearchType};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SearchCapabilities: u8 {
        const WEB_SEARCH        = 0b0000_0001;
        const NEWS_SEARCH       = 0b0000_0010;
        const ACADEMIC_SEARCH   = 0b0000_0100;
        const IMAGE_SEARCH      = 0b0000_1000;
        const CONTENT_EXTRACTION = 0b0001_0000;
        const SEMANTIC_SEARCH   = 0b0010_0000;
    }
}

impl SearchCapabilities {
    pub fn for_search_type(t: SearchType) -> Self {
        match t {
            SearchType::Web => SearchCapabilities::WEB_SEARCH,
            SearchType::News => SearchCapabilities::NEWS_SEARCH,
            SearchType::Academic => SearchCapabilities::ACADEMIC_SEARCH,
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    fn capabilities(&self) -> SearchCapabilities;
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ResearchError>;

    /// Default sequential implementation; providers override when they can
    /// safely parallelize (SPEC_FULL.md §4.2, §9 "Provider heterogeneity").
    async fn search_batch(&self, queries: &[SearchQuery]) -> Vec<SearchResult> {
        let mut out = Vec::with_capacity(queries.len());
        for q in queries {
            out.push(self.search(q).await.unwrap_or_else(|_| SearchResult::empty(q.clone(), self.provider_id())));
        }
        out
    }
}
