//! Content Extractor (SPEC_FULL.md §4.5).

mod clean;

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::resilience::ResilientClient;
use crate::types::SourceDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FailureKind {
    NetworkError,
    Timeout,
    AccessDenied,
    NoContent,
    ParseError,
    UnsupportedContentType,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedExtraction {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

pub struct ExtractedContent {
    pub title: String,
    pub text: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub language: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

pub struct ContentExtractor {
    client: ResilientClient,
    max_content_length: usize,
    per_url_timeout: Duration,
}

impl ContentExtractor {
    pub fn new(client: ResilientClient, max_content_length: usize, per_url_timeout: Duration) -> Self {
        Self { client, max_content_length, per_url_timeout }
    }

    /// Canonicalizes a URL for dedup purposes: lowercase host, strip
    /// fragment, keep (sorted) query (SPEC_FULL.md §4.5).
    pub fn canonicalize(raw: &str) -> Option<String> {
        let mut url = url::Url::parse(raw).ok()?;
        url.set_fragment(None);
        if let Some(host) = url.host_str() {
            let lower = host.to_lowercase();
            let _ = url.set_host(Some(&lower));
        }
        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        pairs.sort();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let qs = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
            url.set_query(Some(&qs));
        }
        Some(url.to_string())
    }

    #[tracing::instrument(skip(self))]
    pub async fn extract(&self, url: &str, want_links: bool) -> Result<ExtractedContent, FailedExtraction> {
        let base = url::Url::parse(url).map_err(|e| FailedExtraction { url: url.to_string(), kind: FailureKind::ParseError, message: e.to_string() })?;

        let fetch = self.client.execute(|client| {
            client.get(url).build().map_err(crate::error::ResearchError::from)
        });

        let response = tokio::time::timeout(self.per_url_timeout, fetch)
            .await
            .map_err(|_| FailedExtraction { url: url.to_string(), kind: FailureKind::Timeout, message: "per-url timeout exceeded".to_string() })?
            .map_err(|e| classify_transport_error(url, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FailedExtraction { url: url.to_string(), kind: FailureKind::AccessDenied, message: format!("http {status}") });
        }

        let content_type = response.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
        if !content_type.is_empty() && !content_type.contains("html") && !content_type.contains("text") {
            return Err(FailedExtraction { url: url.to_string(), kind: FailureKind::UnsupportedContentType, message: content_type });
        }

        let html = response.text().await.map_err(|e| FailedExtraction { url: url.to_string(), kind: FailureKind::NetworkError, message: e.to_string() })?;

        let text = clean::clean_text(&html);
        if text.trim().is_empty() {
            return Err(FailedExtraction { url: url.to_string(), kind: FailureKind::NoContent, message: "no extractable text".to_string() });
        }

        let metadata = clean::extract_metadata(&html, &base, want_links);
        let truncated = clean::truncate_at_word_boundary(&text, self.max_content_length);

        Ok(ExtractedContent {
            title: metadata.title,
            text: truncated,
            author: metadata.author,
            published_date: metadata.published_date,
            language: metadata.language,
            links: metadata.links,
            images: metadata.images,
        })
    }

    /// Batch extraction with bounded parallelism; deduplicates canonical
    /// URLs before fetching so the same page is fetched at most once per
    /// batch. Always returns both successes and the failure list.
    pub async fn extract_batch(&self, urls: &[String], parallelism: usize, want_links: bool) -> (Vec<(String, ExtractedContent)>, Vec<FailedExtraction>) {
        let mut seen = std::collections::HashSet::new();
        let mut deduped = Vec::new();
        for u in urls {
            let canon = Self::canonicalize(u).unwrap_or_else(|| u.clone());
            if seen.insert(canon.clone()) {
                deduped.push((canon, u.clone()));
            }
        }

        let results: Vec<(String, Result<ExtractedContent, FailedExtraction>)> = stream::iter(deduped)
            .map(|(canon, original)| async move { (canon, self.extract(&original, want_links).await) })
            .buffer_unordered(parallelism.max(1))
            .collect()
            .await;

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (canon, result) in results {
            match result {
                Ok(content) => successes.push((canon, content)),
                Err(failure) => failures.push(failure),
            }
        }
        (successes, failures)
    }
}

fn classify_transport_error(url: &str, e: &crate::error::ResearchError) -> FailedExtraction {
    use crate::error::ResearchError;
    let (kind, message) = match e {
        ResearchError::CircuitOpen(_) => (FailureKind::NetworkError, e.to_string()),
        ResearchError::RateLimited { .. } => (FailureKind::NetworkError, e.to_string()),
        ResearchError::ProviderAuth { .. } => (FailureKind::AccessDenied, e.to_string()),
        ResearchError::Transport(_) => (FailureKind::NetworkError, e.to_string()),
        _ => (FailureKind::Unknown, e.to_string()),
    };
    FailedExtraction { url: url.to_string(), kind, message }
}

/// Heuristic trust score: a light domain-reputation proxy, since the spec
/// names a `trustScore` field on `SourceDocument` without specifying how to
/// compute it beyond "heuristic".
pub fn trust_score(domain: &str) -> f64 {
    const KNOWN_GOOD: &[&str] = &["wikipedia.org", "nature.com", "arxiv.org", "gov", "edu"];
    if KNOWN_GOOD.iter().any(|suffix| domain.ends_with(suffix)) {
        0.9
    } else {
        0.6
    }
}

pub fn source_document_from_extracted(id: String, canonical_url: String, content: ExtractedContent, provider_id: String, relevance_score: f64) -> SourceDocument {
    let domain = url::Url::parse(&canonical_url).ok().and_then(|u| u.host_str().map(|h| h.to_string())).unwrap_or_default();
    SourceDocument {
        id,
        canonical_url,
        title: content.title,
        text: content.text,
        author: content.author,
        published_date: content.published_date,
        extracted_at: chrono::Utc::now(),
        provider_id,
        relevance_score,
        trust_score: trust_score(&domain),
        chunks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases_host_and_strips_fragment() {
        let a = ContentExtractor::canonicalize("https://Example.com/path?b=2&a=1#section").unwrap();
        let b = ContentExtractor::canonicalize("https://example.com/path?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize_rejects_garbage() {
        assert!(ContentExtractor::canonicalize("not a url").is_none());
    }
}
