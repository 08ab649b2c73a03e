use serde::{Deserialize, Serialize};

use crate::error::RecordedError;

use super::finding::{Finding, InformationGap, SufficiencyScore};
use super::query::ExpandedQuery;
use super::request::ResearchRequest;
use super::search::SearchResult;
use super::source::SourceDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    Planning,
    Searching,
    ContentExtraction,
    Analysis,
    SufficiencyEvaluation,
    ReportGeneration,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

/// A generated report section (SPEC_FULL.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub purpose: String,
    pub body: String,
    /// `{sourceId, quote}` citations as produced by the synthesis call,
    /// prior to renumbering.
    pub citations: Vec<SectionCitation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCitation {
    pub source_id: String,
    pub quote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    pub purpose: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// Mutable state owned by the orchestrator, one per session (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub session_id: String,
    pub request: ResearchRequest,
    pub started_at: chrono::DateTime<chrono::Utc>,

    pub phase: Phase,
    pub current_iteration: u32,

    pub executed_queries: Vec<crate::types::SearchQuery>,
    pub search_results: Vec<SearchResult>,
    pub collected_sources: Vec<SourceDocument>,
    pub findings: Vec<Finding>,
    pub gaps: Vec<InformationGap>,

    pub latest_sufficiency: Option<SufficiencyScore>,
    pub explored_angles: Vec<String>,

    pub outline: Option<ReportOutline>,
    pub sections: Vec<ReportSection>,

    pub token_usage: u64,
    pub accumulated_cost: f64,
    pub errors: Vec<RecordedError>,
    pub thinking_steps: Vec<String>,

    /// Planner hints accumulated via `Session::add_query`, consumed on the
    /// next `Planning` phase (SPEC_FULL.md §4.12).
    #[serde(default)]
    pub pending_hints: Vec<String>,

    /// Scratch state carrying a phase's output to the next phase's input.
    /// Cleared by the phase that consumes it.
    #[serde(default)]
    pub pending_plan: Vec<ExpandedQuery>,
    #[serde(default)]
    pub pending_urls: Vec<String>,
    #[serde(default)]
    pub pending_coverage_estimate: f64,
}

impl ResearchState {
    pub fn new(request: ResearchRequest) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            request,
            started_at: chrono::Utc::now(),
            phase: Phase::Planning,
            current_iteration: 0,
            executed_queries: Vec::new(),
            search_results: Vec::new(),
            collected_sources: Vec::new(),
            findings: Vec::new(),
            gaps: Vec::new(),
            latest_sufficiency: None,
            explored_angles: Vec::new(),
            outline: None,
            sections: Vec::new(),
            token_usage: 0,
            accumulated_cost: 0.0,
            errors: Vec::new(),
            thinking_steps: Vec::new(),
            pending_hints: Vec::new(),
            pending_plan: Vec::new(),
            pending_urls: Vec::new(),
            pending_coverage_estimate: 0.0,
        }
    }

    pub fn record_error(&mut self, phase: &str, kind: &str, message: impl Into<String>) {
        self.errors.push(RecordedError::new(phase, kind, message));
    }

    pub fn note(&mut self, step: impl Into<String>) {
        self.thinking_steps.push(step.into());
    }

    /// True when every source already has a distinct canonical URL
    /// (SPEC_FULL.md §3 invariants; used by tests/assertions, not on the hot path).
    pub fn sources_have_unique_urls(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.collected_sources.iter().all(|s| seen.insert(s.canonical_url.clone()))
    }
}
