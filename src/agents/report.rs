//! Report Generator Agent (SPEC_FULL.md §4.11): outline → per-section
//! synthesis → assembly with citation renumbering.

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{generate_structured, GenerationOptions, TextGeneration};
use crate::types::{Finding, OutlineSection, ReportOutline, ReportSection, SectionCitation, SourceDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStyle {
    Numbered,
    Apa,
    Mla,
}

#[derive(Deserialize)]
struct OutlineResponse {
    title: String,
    sections: Vec<OutlineSection>,
}

#[derive(Deserialize)]
struct SectionResponse {
    body: String,
    citations: Vec<SectionCitation>,
}

pub struct ReportGeneratorAgent {
    generator: Arc<dyn TextGeneration>,
    max_sections: usize,
}

impl ReportGeneratorAgent {
    pub fn new(generator: Arc<dyn TextGeneration>, max_sections: usize) -> Self {
        Self { generator, max_sections }
    }

    fn fallback_outline() -> ReportOutline {
        ReportOutline {
            title: "Research Report".to_string(),
            sections: vec![
                OutlineSection { title: "Summary".to_string(), purpose: "High-level answer to the query".to_string(), key_points: Vec::new() },
                OutlineSection { title: "Overview".to_string(), purpose: "Context and background".to_string(), key_points: Vec::new() },
                OutlineSection { title: "Findings".to_string(), purpose: "Detailed findings".to_string(), key_points: Vec::new() },
                OutlineSection { title: "Conclusion".to_string(), purpose: "Concluding remarks".to_string(), key_points: Vec::new() },
            ],
        }
    }

    pub async fn generate_outline(&self, query: &str, findings: &[Finding]) -> ReportOutline {
        let claims = findings.iter().take(30).map(|f| f.claim.clone()).collect::<Vec<_>>().join("; ");
        let prompt = format!(
            "Produce a report outline (title + up to {} sections) for the query: {query}\nKey findings: {claims}\n\
             Respond as JSON: {{\"title\": str, \"sections\": [{{\"title\": str, \"purpose\": str, \"key_points\": [str]}}]}}",
            self.max_sections
        );

        let opts = GenerationOptions::with_temperature(0.4);
        match generate_structured::<OutlineResponse>(self.generator.as_ref(), &prompt, opts).await {
            Ok(Some(resp)) if !resp.sections.is_empty() => {
                let mut sections = resp.sections;
                sections.truncate(self.max_sections);
                ReportOutline { title: resp.title, sections }
            }
            _ => Self::fallback_outline(),
        }
    }

    /// Sections are generated sequentially so each sees prior sections for
    /// context; within a section the LLM call itself is a single request.
    pub async fn generate_sections(&self, outline: &ReportOutline, findings: &[Finding], sources: &[SourceDocument]) -> Vec<ReportSection> {
        let mut sections = Vec::new();

        for outline_section in &outline.sections {
            let relevant_findings = relevant_findings_for(outline_section, findings);
            let relevant_sources = relevant_sources_for(&relevant_findings, sources);
            let prior_titles = sections.iter().map(|s: &ReportSection| s.title.clone()).collect::<Vec<_>>().join(", ");

            let snippets = relevant_sources
                .iter()
                .map(|s| format!("[{}] {}: {}", s.id, s.title, truncate(&s.text, 600)))
                .collect::<Vec<_>>()
                .join("\n");
            let claims = relevant_findings.iter().map(|f| format!("({}) {}", f.source_id, f.claim)).collect::<Vec<_>>().join("; ");

            let prompt = format!(
                "Write the \"{}\" section (purpose: {}). Prior sections already written: {prior_titles}.\n\
                 Relevant findings: {claims}\nSource snippets:\n{snippets}\n\
                 Every factual sentence in `body` must end with an inline citation marker in the form \
                 `[source_id]`, using the bracketed ids shown in the source snippets above; do not invent ids \
                 and do not renumber them yourself.\n\
                 Respond as JSON: {{\"body\": str, \"citations\": [{{\"source_id\": str, \"quote\": str}}]}}",
                outline_section.title, outline_section.purpose,
            );

            let opts = GenerationOptions::with_temperature(0.5);
            let (body, citations) = match generate_structured::<SectionResponse>(self.generator.as_ref(), &prompt, opts).await {
                Ok(Some(resp)) => (resp.body, resp.citations),
                _ => (format!("No content could be synthesized for {}.", outline_section.title), Vec::new()),
            };

            sections.push(ReportSection { title: outline_section.title.clone(), purpose: outline_section.purpose.clone(), body, citations });
        }

        sections
    }

    /// Assembles sections under the title, renumbers citations by first
    /// occurrence, and appends a references section. Citations referring to
    /// a source id not in `collectedSources` are dropped, never emitted as
    /// dangling numbers (SPEC_FULL.md §9).
    pub fn assemble(outline: &ReportOutline, sections: &[ReportSection], collected_sources: &[SourceDocument], style: ReferenceStyle, include_references: bool) -> (String, Vec<String>) {
        let valid_ids: std::collections::HashSet<&str> = collected_sources.iter().map(|s| s.id.as_str()).collect();

        let mut numbering: Vec<String> = Vec::new();
        let mut number_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

        let mut body = format!("# {}\n\n", outline.title);
        for section in sections {
            body.push_str(&format!("## {}\n\n", section.title));

            let mut rendered = section.body.clone();
            for token in extract_citation_tokens(&section.body) {
                if !valid_ids.contains(token.as_str()) {
                    rendered = rendered.replace(&format!("[{token}]"), "");
                    continue;
                }
                let n = *number_of.entry(token.clone()).or_insert_with(|| {
                    numbering.push(token.clone());
                    numbering.len()
                });
                rendered = rendered.replace(&format!("[{token}]"), &format!("[{n}]"));
            }

            body.push_str(&rendered);
            body.push_str("\n\n");
        }

        if include_references && !numbering.is_empty() {
            body.push_str("## References\n\n");
            for (idx, source_id) in numbering.iter().enumerate() {
                if let Some(source) = collected_sources.iter().find(|s| &s.id == source_id) {
                    body.push_str(&format_reference(idx + 1, source, style));
                    body.push('\n');
                }
            }
        }

        (body, numbering)
    }
}

fn relevant_findings_for(section: &OutlineSection, findings: &[Finding]) -> Vec<Finding> {
    let keywords: Vec<String> = format!("{} {}", section.title, section.purpose).split_whitespace().map(|w| w.to_lowercase()).collect();
    findings
        .iter()
        .filter(|f| {
            let lower = f.claim.to_lowercase();
            keywords.iter().any(|k| k.len() > 3 && lower.contains(k.as_str()))
        })
        .cloned()
        .collect()
}

fn relevant_sources_for<'a>(findings: &[Finding], sources: &'a [SourceDocument]) -> Vec<&'a SourceDocument> {
    let ids: std::collections::HashSet<&str> = findings.iter().map(|f| f.source_id.as_str()).collect();
    sources.iter().filter(|s| ids.contains(s.id.as_str())).collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn extract_citation_tokens(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '[' {
            if let Some(end) = body[i..].find(']') {
                let token = &body[i + 1..i + end];
                if !token.is_empty() && !token.chars().all(|c| c.is_ascii_digit()) {
                    tokens.push(token.to_string());
                }
            }
        }
    }
    tokens
}

fn format_reference(n: usize, source: &SourceDocument, style: ReferenceStyle) -> String {
    let author = source.author.clone().unwrap_or_else(|| "Unknown".to_string());
    let date = source.published_date.clone().unwrap_or_else(|| "n.d.".to_string());
    match style {
        ReferenceStyle::Numbered => format!("[{n}] {} — {} ({})", source.title, source.canonical_url, date),
        ReferenceStyle::Apa => format!("[{n}] {}. ({}). {}. Retrieved from {}", author, date, source.title, source.canonical_url),
        ReferenceStyle::Mla => format!("[{n}] {}. \"{}\". {}, {}.", author, source.title, date, source.canonical_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str) -> SourceDocument {
        SourceDocument { id: id.to_string(), canonical_url: format!("https://example.com/{id}"), title: format!("Title {id}"), text: String::new(), author: None, published_date: None, extracted_at: chrono::Utc::now(), provider_id: "p".to_string(), relevance_score: 1.0, trust_score: 0.5, chunks: Vec::new() }
    }

    #[test]
    fn citation_renumbering_is_bijection_by_first_occurrence() {
        let outline = ReportOutline { title: "T".to_string(), sections: vec![] };
        let sections = vec![
            ReportSection { title: "A".to_string(), purpose: "p".to_string(), body: "Claim one [src-b] and claim two [src-a].".to_string(), citations: vec![] },
            ReportSection { title: "B".to_string(), purpose: "p".to_string(), body: "Claim three [src-b] again.".to_string(), citations: vec![] },
        ];
        let sources = vec![source("src-a"), source("src-b")];
        let (body, numbering) = ReportGeneratorAgent::assemble(&outline, &sections, &sources, ReferenceStyle::Numbered, true);

        assert_eq!(numbering, vec!["src-b".to_string(), "src-a".to_string()]);
        assert!(body.contains("[1]"));
        assert!(body.contains("[2]"));
        assert!(!body.contains("[src-b]"));
    }

    #[test]
    fn dangling_citation_is_dropped_not_emitted() {
        let outline = ReportOutline { title: "T".to_string(), sections: vec![] };
        let sections = vec![ReportSection { title: "A".to_string(), purpose: "p".to_string(), body: "Unverified claim [ghost-source].".to_string(), citations: vec![] }];
        let sources = vec![source("src-a")];
        let (body, numbering) = ReportGeneratorAgent::assemble(&outline, &sections, &sources, ReferenceStyle::Numbered, true);
        assert!(numbering.is_empty());
        assert!(!body.contains("ghost-source"));
    }
}
