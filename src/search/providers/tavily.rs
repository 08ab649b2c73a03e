//! JSON-API search provider, grounded on Tavily's documented contract
//! (SPEC_FULL.md §4.2, §6).

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::resilience::ResilientClient;
use crate::search::{SearchCapabilities, SearchProvider};
use crate::types::{SearchDepth, SearchQuery, SearchResult, SearchSource};

const MAX_BATCH_CONCURRENCY: usize = 8;

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    max_results: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_domains: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_domains: &'a [String],
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    published_date: Option<String>,
}

pub struct TavilyProvider {
    client: ResilientClient,
    api_key: String,
    base_url: String,
}

impl TavilyProvider {
    pub fn new(client: ResilientClient, api_key: impl Into<String>) -> Self {
        Self { client, api_key: api_key.into(), base_url: "https://api.tavily.com".to_string() }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn provider_id(&self) -> &str {
        "tavily"
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities::WEB_SEARCH | SearchCapabilities::NEWS_SEARCH | SearchCapabilities::ACADEMIC_SEARCH
    }

    #[tracing::instrument(skip(self), fields(provider = "tavily"))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ResearchError> {
        let body = TavilyRequest {
            query: &query.text,
            search_depth: match query.depth {
                SearchDepth::Deep => "advanced",
                SearchDepth::Basic => "basic",
            },
            include_answer: true,
            include_raw_content: query.include_raw_content,
            max_results: query.max_results,
            include_domains: &query.include_domains,
            exclude_domains: &query.exclude_domains,
        };

        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .execute(|client| {
                client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .build()
                    .map_err(ResearchError::from)
            })
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ResearchError::ProviderAuth {
                provider: "tavily".to_string(),
                message: format!("http {status}"),
            });
        }

        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Transport(format!("tavily response not deserializable: {e}")))?;

        let sources = parsed
            .results
            .into_iter()
            .take(query.max_results)
            .map(|r| SearchSource {
                url: r.url,
                title: r.title,
                snippet: r.content.unwrap_or_default(),
                raw_content: r.raw_content,
                score: r.score,
                published_date: r.published_date,
            })
            .collect();

        Ok(SearchResult {
            query: query.clone(),
            provider: self.provider_id().to_string(),
            answer: parsed.answer,
            sources,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Runs concurrently, bounded by `MAX_BATCH_CONCURRENCY`; per-query
    /// failures are caught and replaced by an empty result so the batch
    /// itself never fails if any individual call succeeds.
    async fn search_batch(&self, queries: &[SearchQuery]) -> Vec<SearchResult> {
        stream::iter(queries.iter())
            .map(|q| async move { self.search(q).await.unwrap_or_else(|_| SearchResult::empty(q.clone(), self.provider_id())) })
            .buffer_unordered(MAX_BATCH_CONCURRENCY)
            .collect()
            .await
    }
}
