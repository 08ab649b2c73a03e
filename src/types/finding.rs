use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Case-insensitive parse; unknown strings map to `Medium` (SPEC_FULL.md §4.10).
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            _ => Priority::Medium,
        }
    }
}

/// A single factual claim extracted from a source, with evidence and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub claim: String,
    pub source_id: String,
    pub evidence_quote: Option<String>,
    /// In [0, 1].
    pub verification_score: f64,
    pub verified: bool,
    pub iteration_discovered: u32,
    pub discovered_at: chrono::DateTime<chrono::Utc>,
}

impl Finding {
    /// Key used for duplicate detection: first 50 chars of the
    /// whitespace-normalized, lowercased claim (SPEC_FULL.md §4.10).
    pub fn dedup_key(&self) -> String {
        let normalized: String = self.claim.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        normalized.chars().take(50).collect()
    }
}

/// An identified missing piece of information, with a concrete follow-up
/// query and a priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformationGap {
    pub description: String,
    pub priority: Priority,
    pub suggested_query: String,
    pub identified_at: chrono::DateTime<chrono::Utc>,
}

/// A scalar judgment of whether collected evidence answers the query well
/// enough to stop iterating (SPEC_FULL.md §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SufficiencyScore {
    pub overall: f64,
    pub coverage: f64,
    pub source_diversity: f64,
    pub quality: f64,
    pub freshness: Option<f64>,
    pub new_findings_this_iteration: usize,
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}

impl SufficiencyScore {
    /// Weighted mean: coverage 0.4, quality 0.3, diversity 0.2, freshness
    /// 0.1 — renormalized when freshness is absent.
    pub fn compute_overall(coverage: f64, quality: f64, source_diversity: f64, freshness: Option<f64>) -> f64 {
        match freshness {
            Some(f) => coverage * 0.4 + quality * 0.3 + source_diversity * 0.2 + f * 0.1,
            None => {
                let total_weight = 0.4 + 0.3 + 0.2;
                (coverage * 0.4 + quality * 0.3 + source_diversity * 0.2) / total_weight
            }
        }
    }

    pub fn is_sufficient(&self, threshold: f64) -> bool {
        self.overall >= threshold
    }

    pub fn needs_more_research(&self, threshold: f64, gap_count: usize) -> bool {
        self.overall < threshold && gap_count > 0
    }
}
