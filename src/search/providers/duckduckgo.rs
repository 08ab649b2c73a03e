//! Scraped-HTML search provider, grounded on the teacher's DuckDuckGo engine
//! (`tools/search/engines/duckduckgo.rs`): browser-like headers, 202-as-bot-
//! protection retry, redirect-URL unwrapping via `uddg` (SPEC_FULL.md §4.2).

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use tokio::time::sleep;

use crate::error::ResearchError;
use crate::resilience::{bot_protection_jitter, sequential_batch_jitter};
use crate::search::{SearchCapabilities, SearchProvider};
use crate::types::{SearchQuery, SearchResult, SearchSource};

const MAX_BOT_PROTECTION_RETRIES: u32 = 3;

fn primary_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("div.result").unwrap())
}

fn fallback_anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<a[^>]+class="[^"]*\bresult\b[^"]*"[^>]+href="(https?://[^"]+)"[^>]*>(.*?)</a>"#).unwrap())
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let candidate = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if let Some(rest) = href.strip_prefix('/') {
        format!("https://duckduckgo.com{rest}")
    } else {
        href.to_string()
    };

    if let Ok(url) = url::Url::parse(&candidate) {
        if matches!(url.host_str(), Some("duckduckgo.com")) && url.path().starts_with("/l/") {
            for (k, v) in url.query_pairs() {
                if k == "uddg" && !v.trim().is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Some(candidate)
    } else {
        None
    }
}

fn parse_results(html: &str, max_results: usize) -> Vec<SearchSource> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a.result__a").unwrap();
    let snippet_sel = Selector::parse("a.result__snippet, div.result__snippet").unwrap();

    let mut out = Vec::new();
    for item in doc.select(primary_selector()) {
        if out.len() >= max_results {
            break;
        }
        let Some(link) = item.select(&link_sel).next() else { continue };
        let Some(url) = unwrap_redirect(link.value().attr("href").unwrap_or("")) else { continue };
        let title = link.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
        let snippet = item
            .select(&snippet_sel)
            .next()
            .map(|n| n.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        out.push(SearchSource { url, title, snippet, raw_content: None, score: 0.0, published_date: None });
    }

    // Fallback: any result-class anchor with an absolute http(s) URL.
    if out.is_empty() {
        for cap in fallback_anchor_regex().captures_iter(html) {
            if out.len() >= max_results {
                break;
            }
            let Some(url) = unwrap_redirect(&cap[1]) else { continue };
            let title = cap[2].trim().to_string();
            out.push(SearchSource { url, title, snippet: String::new(), raw_content: None, score: 0.0, published_date: None });
        }
    }

    out
}

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_once(&self, query_text: &str) -> Result<(reqwest::StatusCode, String), ResearchError> {
        let resp = self
            .client
            .post("https://html.duckduckgo.com/html/")
            .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36")
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-Dest", "document")
            .form(&[("q", query_text), ("kl", "us-en")])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn provider_id(&self) -> &str {
        "duckduckgo"
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities::WEB_SEARCH
    }

    #[tracing::instrument(skip(self), fields(provider = "duckduckgo"))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ResearchError> {
        let mut sources = Vec::new();

        for attempt in 0..=MAX_BOT_PROTECTION_RETRIES {
            let (status, body) = self.post_once(&query.text).await?;

            if status == reqwest::StatusCode::ACCEPTED {
                if attempt < MAX_BOT_PROTECTION_RETRIES {
                    sleep(bot_protection_jitter()).await;
                    continue;
                }
                break;
            }

            let parsed = parse_results(&body, query.max_results);
            if parsed.is_empty() && attempt < MAX_BOT_PROTECTION_RETRIES {
                sleep(bot_protection_jitter()).await;
                continue;
            }
            sources = parsed;
            break;
        }

        Ok(SearchResult { query: query.clone(), provider: self.provider_id().to_string(), answer: None, sources, timestamp: chrono::Utc::now() })
    }

    /// Bot protection trips on parallel requests, so this batch is
    /// deliberately sequential with jittered inter-query delays
    /// (SPEC_FULL.md §4.2, §9 "Provider heterogeneity").
    async fn search_batch(&self, queries: &[SearchQuery]) -> Vec<SearchResult> {
        let mut out = Vec::with_capacity(queries.len());
        for (i, q) in queries.iter().enumerate() {
            if i > 0 {
                sleep(sequential_batch_jitter()).await;
            }
            out.push(self.search(q).await.unwrap_or_else(|_| SearchResult::empty(q.clone(), self.provider_id())));
        }
        out
    }
}
