//! Progress events emitted by the orchestrator (SPEC_FULL.md §4.12).

use crate::types::{Phase, ResearchResult};

#[derive(Debug, Clone)]
pub enum ResearchProgress {
    PhaseChanged { session_id: String, iteration: u32, phase: Phase },
    PlanGenerated { session_id: String, query_count: usize },
    SearchCompleted { session_id: String, provider: String, source_count: usize },
    AnalysisCompleted { session_id: String, finding_count: usize, gap_count: usize },
    ReportSection { session_id: String, title: String },
    Completed { session_id: String, result: Box<ResearchResult> },
    Failed { session_id: String, error: String },
}
