//! Analysis Agent (SPEC_FULL.md §4.10).

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{generate_structured, generate_structured_with_usage, GenerationOptions, TextGeneration};
use crate::types::{Finding, InformationGap, Priority, SourceDocument, SufficiencyScore};

#[derive(Deserialize)]
struct ExtractedClaim {
    claim: String,
    evidence_quote: Option<String>,
    confidence: f64,
}

#[derive(Deserialize)]
struct FindingsResponse {
    claims: Vec<ExtractedClaim>,
}

#[derive(Deserialize)]
struct RawGap {
    description: String,
    priority: String,
    suggested_query: String,
}

#[derive(Deserialize)]
struct GapsResponse {
    gaps: Vec<RawGap>,
    coverage_estimate: f64,
}

#[derive(Deserialize)]
struct SufficiencyResponse {
    coverage: f64,
    quality: f64,
    source_diversity: f64,
    #[serde(default)]
    freshness: Option<f64>,
    #[serde(default)]
    rationale: String,
}

pub struct AnalysisAgent {
    generator: Arc<dyn TextGeneration>,
    max_sources_to_analyze: usize,
    sufficiency_threshold: f64,
}

impl AnalysisAgent {
    pub fn new(generator: Arc<dyn TextGeneration>, max_sources_to_analyze: usize, sufficiency_threshold: f64) -> Self {
        Self { generator, max_sources_to_analyze, sufficiency_threshold }
    }

    /// Step 1: per source (up to `maxSourcesToAnalyze`), extracts claims
    /// with evidence and confidence. New `Finding`s get fresh ids. Returns
    /// the total token usage reported across these calls, for the caller to
    /// accumulate onto the run's cost (SPEC_FULL.md §4.12, §5).
    pub async fn extract_findings(&self, sources: &[SourceDocument], iteration: u32) -> (Vec<Finding>, u32) {
        let mut findings = Vec::new();
        let mut tokens_used = 0u32;
        for source in sources.iter().take(self.max_sources_to_analyze) {
            let prompt = format!(
                "Extract factual claims from this source. For each, give the claim, an evidence quote, and a confidence in [0,1].\n\
                 Source title: {}\nSource text: {}\n\
                 Respond as JSON: {{\"claims\": [{{\"claim\": str, \"evidence_quote\": str|null, \"confidence\": 0..1}}]}}",
                source.title,
                truncate(&source.text, 4000),
            );

            let opts = GenerationOptions::with_temperature(0.2);
            let Ok((maybe_resp, tokens)) = generate_structured_with_usage::<FindingsResponse>(self.generator.as_ref(), &prompt, opts).await else { continue };
            tokens_used += tokens;
            let Some(resp) = maybe_resp else { continue };

            for claim in resp.claims {
                findings.push(Finding {
                    id: uuid::Uuid::new_v4().to_string(),
                    claim: claim.claim,
                    source_id: source.id.clone(),
                    evidence_quote: claim.evidence_quote,
                    verification_score: claim.confidence.clamp(0.0, 1.0),
                    verified: claim.confidence >= 0.7,
                    iteration_discovered: iteration,
                    discovered_at: chrono::Utc::now(),
                });
            }
        }
        (findings, tokens_used)
    }

    /// Step 2: two findings are duplicates if their dedup keys match; keep
    /// the one with the higher verification score.
    pub fn dedupe_findings(findings: Vec<Finding>) -> Vec<Finding> {
        let mut best: std::collections::HashMap<String, Finding> = std::collections::HashMap::new();
        for finding in findings {
            let key = finding.dedup_key();
            match best.get(&key) {
                Some(existing) if existing.verification_score >= finding.verification_score => {}
                _ => {
                    best.insert(key, finding);
                }
            }
        }
        let mut out: Vec<Finding> = best.into_values().collect();
        out.sort_by_key(|f| f.iteration_discovered);
        out
    }

    /// Step 3: produces `InformationGap`s with case-insensitive priority
    /// parsing and a coverage estimate.
    pub async fn analyze_gaps(&self, query: &str, findings: &[Finding]) -> (Vec<InformationGap>, f64) {
        let claims = findings.iter().map(|f| f.claim.clone()).collect::<Vec<_>>().join("; ");
        let prompt = format!(
            "Original query: {query}\nFindings so far: {claims}\n\
             Identify information gaps and a concrete follow-up search query for each, plus an overall coverage estimate in [0,1].\n\
             Respond as JSON: {{\"gaps\": [{{\"description\": str, \"priority\": \"Low\"|\"Medium\"|\"High\", \"suggested_query\": str}}], \"coverage_estimate\": 0..1}}"
        );

        let opts = GenerationOptions::with_temperature(0.3);
        match generate_structured::<GapsResponse>(self.generator.as_ref(), &prompt, opts).await {
            Ok(Some(resp)) => {
                let gaps = resp
                    .gaps
                    .into_iter()
                    .map(|g| InformationGap { description: g.description, priority: Priority::parse_lenient(&g.priority), suggested_query: g.suggested_query, identified_at: chrono::Utc::now() })
                    .collect();
                (gaps, resp.coverage_estimate.clamp(0.0, 1.0))
            }
            _ => (Vec::new(), heuristic_coverage(findings)),
        }
    }

    /// Step 4: sub-scores via LLM, `overallScore` computed deterministically
    /// by the agent (not trusted from the LLM) per the documented weighted
    /// mean. Falls back to a heuristic on LLM failure.
    pub async fn evaluate_sufficiency(&self, query: &str, sources: &[SourceDocument], findings: &[Finding], gap_count: usize, coverage_estimate: f64) -> SufficiencyScore {
        let prompt = format!(
            "Original query: {query}\nCollected {} sources, {} findings, {} open gaps.\n\
             Score coverage, quality, and source_diversity in [0,1], and optionally freshness. Give a short rationale.\n\
             Respond as JSON: {{\"coverage\": 0..1, \"quality\": 0..1, \"source_diversity\": 0..1, \"freshness\": 0..1|null, \"rationale\": str}}",
            sources.len(),
            findings.len(),
            gap_count,
        );

        let opts = GenerationOptions::with_temperature(0.2);
        let (coverage, quality, source_diversity, freshness) = match generate_structured::<SufficiencyResponse>(self.generator.as_ref(), &prompt, opts).await {
            Ok(Some(resp)) => (resp.coverage.clamp(0.0, 1.0), resp.quality.clamp(0.0, 1.0), resp.source_diversity.clamp(0.0, 1.0), resp.freshness.map(|f| f.clamp(0.0, 1.0))),
            _ => (coverage_estimate, 0.5, diversity_from_sources(sources), None),
        };

        let overall = SufficiencyScore::compute_overall(coverage, quality, source_diversity, freshness);

        SufficiencyScore {
            overall,
            coverage,
            source_diversity,
            quality,
            freshness,
            new_findings_this_iteration: findings.len(),
            evaluated_at: chrono::Utc::now(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.sufficiency_threshold
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn heuristic_coverage(findings: &[Finding]) -> f64 {
    // Gap density proxy: more findings imply denser coverage, saturating at 1.0.
    (findings.len() as f64 / 10.0).min(1.0)
}

fn diversity_from_sources(sources: &[SourceDocument]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let distinct_domains: std::collections::HashSet<Option<String>> = sources.iter().map(|s| s.domain()).collect();
    (distinct_domains.len() as f64 / sources.len() as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(claim: &str, score: f64, iteration: u32) -> Finding {
        Finding { id: uuid::Uuid::new_v4().to_string(), claim: claim.to_string(), source_id: "s1".to_string(), evidence_quote: None, verification_score: score, verified: score >= 0.7, iteration_discovered: iteration, discovered_at: chrono::Utc::now() }
    }

    #[test]
    fn dedupe_keeps_higher_scoring_duplicate() {
        let findings = vec![finding("The sky is blue during the day because of Rayleigh scattering effects", 0.4, 0), finding("The sky is blue during the day because of Rayleigh scattering something else", 0.9, 1)];
        let deduped = AnalysisAgent::dedupe_findings(findings);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].verification_score, 0.9);
    }

    #[test]
    fn dedupe_keeps_distinct_claims() {
        let findings = vec![finding("claim one is about rust", 0.5, 0), finding("claim two is about python", 0.5, 0)];
        assert_eq!(AnalysisAgent::dedupe_findings(findings).len(), 2);
    }
}
