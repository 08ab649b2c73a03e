use serde::{Deserialize, Serialize};

use super::finding::{Finding, InformationGap};
use super::source::SourceDocument;
use super::state::ResearchState;
use crate::error::RecordedError;

/// Output of a completed (or failed-but-partial) research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub session_id: String,
    pub query: String,
    pub report: String,
    pub iteration_count: u32,
    pub sources: Vec<SourceDocument>,
    pub findings: Vec<Finding>,
    pub gaps: Vec<InformationGap>,
    pub errors: Vec<RecordedError>,
    pub token_usage: u64,
    pub cost: f64,
}

impl ResearchResult {
    pub fn from_state(state: &ResearchState, report: String) -> Self {
        Self {
            session_id: state.session_id.clone(),
            query: state.request.query.clone(),
            report,
            iteration_count: state.current_iteration,
            sources: state.collected_sources.clone(),
            findings: state.findings.clone(),
            gaps: state.gaps.clone(),
            errors: state.errors.clone(),
            token_usage: state.token_usage,
            cost: state.accumulated_cost,
        }
    }
}

/// Serializable snapshot of [`ResearchState`] at a phase boundary, sufficient
/// to resume the run (SPEC_FULL.md §3, §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchCheckpoint {
    pub session_id: String,
    pub checkpoint_number: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub state: ResearchState,
    pub top_findings: Vec<Finding>,
    pub top_gap_queries: Vec<String>,
    pub summary: String,
}

impl ResearchCheckpoint {
    pub fn from_state(state: &ResearchState, checkpoint_number: u32) -> Self {
        let mut findings = state.findings.clone();
        findings.sort_by(|a, b| b.verification_score.partial_cmp(&a.verification_score).unwrap_or(std::cmp::Ordering::Equal));
        findings.truncate(5);

        let top_gap_queries = state.gaps.iter().take(5).map(|g| g.suggested_query.clone()).collect();

        let summary = format!(
            "Session {} — iteration {}/{}, phase {:?}, {} sources, {} findings, {} gaps",
            state.session_id,
            state.current_iteration,
            state.request.max_iterations,
            state.phase,
            state.collected_sources.len(),
            state.findings.len(),
            state.gaps.len(),
        );

        Self {
            session_id: state.session_id.clone(),
            checkpoint_number,
            created_at: chrono::Utc::now(),
            state: state.clone(),
            top_findings: findings,
            top_gap_queries,
            summary,
        }
    }
}
