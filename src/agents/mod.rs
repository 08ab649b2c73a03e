//! LLM-driven agents (SPEC_FULL.md §4.7-§4.11).

pub mod analysis;
pub mod coordinator;
pub mod enrichment;
pub mod planner;
pub mod report;

pub use analysis::AnalysisAgent;
pub use coordinator::SearchCoordinatorAgent;
pub use enrichment::ContentEnrichmentAgent;
pub use planner::QueryPlannerAgent;
pub use report::ReportGeneratorAgent;
