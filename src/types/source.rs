use serde::{Deserialize, Serialize};

/// A chunk of extracted content (SPEC_FULL.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    pub source_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
    pub token_count: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// A deduplicated piece of collected evidence (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub canonical_url: String,
    pub title: String,
    pub text: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub extracted_at: chrono::DateTime<chrono::Utc>,
    pub provider_id: String,
    /// Relevance as reported by the search provider.
    pub relevance_score: f64,
    /// Heuristic trust score (e.g. domain reputation proxy); see
    /// [`crate::extract::trust_score`].
    pub trust_score: f64,
    #[serde(default)]
    pub chunks: Vec<ContentChunk>,
}

impl SourceDocument {
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.canonical_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}
