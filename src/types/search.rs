use serde::{Deserialize, Serialize};

use super::query::SearchQuery;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSource {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub raw_content: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// Result of a single provider call (SPEC_FULL.md §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: SearchQuery,
    pub provider: String,
    #[serde(default)]
    pub answer: Option<String>,
    pub sources: Vec<SearchSource>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SearchResult {
    pub fn empty(query: SearchQuery, provider: impl Into<String>) -> Self {
        Self {
            query,
            provider: provider.into(),
            answer: None,
            sources: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }
}
