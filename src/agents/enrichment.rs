//! Content Enrichment Agent (SPEC_FULL.md §4.9).

use std::sync::Arc;

use crate::chunk::ContentChunker;
use crate::extract::{source_document_from_extracted, ContentExtractor, FailedExtraction};
use crate::types::{SearchResult, SourceDocument};

#[derive(Debug, Clone, Default)]
pub struct EnrichmentProgress {
    pub total: usize,
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub chunks_created: usize,
}

pub struct ContentEnrichmentAgent {
    extractor: Arc<ContentExtractor>,
    chunker: Arc<ContentChunker>,
    parallelism: usize,
}

impl ContentEnrichmentAgent {
    pub fn new(extractor: Arc<ContentExtractor>, chunker: Arc<ContentChunker>, parallelism: usize) -> Self {
        Self { extractor, chunker, parallelism }
    }

    /// For URLs whose originating `SearchResult` already carries usable raw
    /// content, skips the fetch and builds a `SourceDocument` directly;
    /// otherwise calls the content extractor. New sources skip any whose
    /// canonical URL is already present in `existing`.
    pub async fn enrich(&self, urls: &[String], search_results: &[SearchResult], existing: &[SourceDocument]) -> (Vec<SourceDocument>, Vec<FailedExtraction>, EnrichmentProgress) {
        let mut progress = EnrichmentProgress { total: urls.len(), ..Default::default() };
        let mut existing_urls: std::collections::HashSet<String> = existing.iter().map(|s| s.canonical_url.clone()).collect();

        let raw_content_by_url = index_raw_content(search_results);

        let mut to_fetch = Vec::new();
        let mut direct_sources = Vec::new();

        for url in urls {
            let canon = ContentExtractor::canonicalize(url).unwrap_or_else(|| url.clone());
            if existing_urls.contains(&canon) {
                progress.completed += 1;
                continue;
            }

            if let Some((raw_text, title, score)) = raw_content_by_url.get(url) {
                let id = uuid::Uuid::new_v4().to_string();
                let doc = SourceDocument {
                    id,
                    canonical_url: canon.clone(),
                    title: title.clone(),
                    text: raw_text.clone(),
                    author: None,
                    published_date: None,
                    extracted_at: chrono::Utc::now(),
                    provider_id: "search-raw-content".to_string(),
                    relevance_score: *score,
                    trust_score: crate::extract::trust_score(&canon),
                    chunks: Vec::new(),
                };
                existing_urls.insert(canon);
                direct_sources.push(doc);
                progress.completed += 1;
                progress.successful += 1;
            } else {
                to_fetch.push(url.clone());
            }
        }

        let (extracted, failures) = self.extractor.extract_batch(&to_fetch, self.parallelism, true).await;

        let mut sources = direct_sources;
        for (canon, content) in extracted {
            if !existing_urls.insert(canon.clone()) {
                continue;
            }
            let relevance = raw_content_by_url.get(&canon).map(|(_, _, s)| *s).unwrap_or(0.5);
            let doc = source_document_from_extracted(uuid::Uuid::new_v4().to_string(), canon, content, "content-extractor".to_string(), relevance);
            progress.completed += 1;
            progress.successful += 1;
            sources.push(doc);
        }

        progress.completed += failures.len();
        progress.failed = failures.len();

        for doc in sources.iter_mut() {
            doc.chunks = self.chunker.chunk(&doc.id, &doc.text);
            progress.chunks_created += doc.chunks.len();
        }

        (sources, failures, progress)
    }
}

/// Maps url -> (raw_content, title, relevance score) for sources whose
/// provider already returned usable raw content.
fn index_raw_content(search_results: &[SearchResult]) -> std::collections::HashMap<String, (String, String, f64)> {
    let mut out = std::collections::HashMap::new();
    for result in search_results {
        for source in &result.sources {
            if let Some(raw) = &source.raw_content {
                if !raw.trim().is_empty() {
                    out.entry(source.url.clone()).or_insert_with(|| (raw.clone(), source.title.clone(), source.score));
                }
            }
        }
    }
    out
}
