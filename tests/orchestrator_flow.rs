//! End-to-end exercise of the orchestrator's state machine through its
//! public API, with a fake search provider (so no outbound network calls
//! are made) and a fake text generator (so every LLM-dependent agent takes
//! its documented fallback path).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use deepscout::agents::{AnalysisAgent, ContentEnrichmentAgent, QueryPlannerAgent, ReportGeneratorAgent, SearchCoordinatorAgent};
use deepscout::cache::SearchResultCache;
use deepscout::chunk::ContentChunker;
use deepscout::error::ResearchError;
use deepscout::extract::ContentExtractor;
use deepscout::llm::{GenerationOptions, GenerationOutcome, TextGeneration};
use deepscout::resilience::ResilientClient;
use deepscout::search::{SearchCapabilities, SearchProvider};
use deepscout::search::ProviderFactory;
use deepscout::types::{SearchQuery, SearchResult, SearchSource};
use deepscout::{Orchestrator, Phase, RuntimeConfig};
use deepscout::{ResearchProgress, ResearchRequest};

/// Always returns two sources with inline raw content, so the content
/// enrichment agent never has to dereference a real URL.
struct FakeProvider;

#[async_trait]
impl SearchProvider for FakeProvider {
    fn provider_id(&self) -> &str {
        "fake"
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities::WEB_SEARCH | SearchCapabilities::NEWS_SEARCH | SearchCapabilities::ACADEMIC_SEARCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ResearchError> {
        let sources = vec![
            SearchSource {
                url: format!("https://example.test/a?q={}", query.text.replace(' ', "-")),
                title: "Rust async runtimes, a primer".to_string(),
                snippet: "An overview of cooperative scheduling.".to_string(),
                raw_content: Some("Tokio schedules tasks cooperatively atop a thread pool and a reactor.".to_string()),
                score: 0.9,
                published_date: Some("2024-01-01".to_string()),
            },
            SearchSource {
                url: "https://example.test/b".to_string(),
                title: "Comparing async executors".to_string(),
                snippet: "tokio vs async-std vs smol".to_string(),
                raw_content: Some("Executors differ chiefly in their I/O driver and task-stealing strategy.".to_string()),
                score: 0.7,
                published_date: None,
            },
        ];
        Ok(SearchResult { query: query.clone(), provider: "fake".to_string(), answer: None, sources, timestamp: chrono::Utc::now() })
    }
}

/// Never produces parseable JSON, forcing every agent onto its documented
/// deterministic fallback.
struct UnparsableGenerator;

#[async_trait]
impl TextGeneration for UnparsableGenerator {
    async fn generate(&self, _prompt: &str, _opts: GenerationOptions) -> Result<GenerationOutcome, ResearchError> {
        Ok(GenerationOutcome { text: "I cannot produce JSON.".to_string(), token_usage: Some(4), finish_reason: None })
    }
}

fn build_test_orchestrator() -> (Arc<Orchestrator>, RuntimeConfig) {
    let mut config = RuntimeConfig::from_env();
    config.default_search_provider = "fake".to_string();
    config.max_sources_to_analyze = 20;

    let generator: Arc<dyn TextGeneration> = Arc::new(UnparsableGenerator);
    let planner = QueryPlannerAgent::new(Arc::clone(&generator));

    let mut factory = ProviderFactory::new("fake");
    factory.register(Arc::new(FakeProvider));
    let coordinator = SearchCoordinatorAgent::new(Arc::new(factory), Arc::new(SearchResultCache::new()), config.max_parallel_searches);

    let extract_client = ResilientClient::new(reqwest::Client::new(), Duration::from_secs(5), 1, "extractor");
    let extractor = Arc::new(ContentExtractor::new(extract_client, config.max_content_length, Duration::from_secs(5)));
    let chunker = Arc::new(ContentChunker::default());
    let enrichment = ContentEnrichmentAgent::new(extractor, chunker, config.max_parallel_extractions);

    let analysis = AnalysisAgent::new(Arc::clone(&generator), config.max_sources_to_analyze, config.sufficiency_threshold);
    let report = ReportGeneratorAgent::new(generator, config.max_sections);

    let orchestrator = Orchestrator::new(config.clone(), planner, coordinator, enrichment, analysis, report);
    (orchestrator, config)
}

#[tokio::test]
async fn execute_drives_a_full_run_to_completion_without_network() {
    let (orchestrator, _config) = build_test_orchestrator();
    let mut request = ResearchRequest::new("how does the tokio scheduler work");
    request.max_iterations = 2;

    let result = orchestrator.execute(request).await.expect("execute should not hard-fail");

    assert!(!result.sources.is_empty(), "raw_content sources should have been collected without a fetch");
    assert!(result.report.contains("# Research Report"));
    assert!(result.report.contains("## Summary"));
    assert!(result.iteration_count >= 1);
    assert!(result.errors.is_empty(), "fake provider + raw content should not produce extraction errors: {:?}", result.errors);
}

#[tokio::test]
async fn zero_iteration_budget_skips_straight_to_a_report() {
    let (orchestrator, _config) = build_test_orchestrator();
    let mut request = ResearchRequest::new("anything");
    request.max_iterations = 0;

    let result = orchestrator.execute(request).await.unwrap();

    assert!(result.sources.is_empty());
    assert!(result.report.contains("# Research Report"));
}

#[tokio::test]
async fn execute_stream_emits_a_phase_changed_sequence_ending_in_completed() {
    let (orchestrator, _config) = build_test_orchestrator();
    let mut request = ResearchRequest::new("what is backpressure");
    request.max_iterations = 1;

    let mut rx = orchestrator.execute_stream(request);
    let mut phases = Vec::new();
    let mut saw_completed = false;

    while let Some(event) = rx.recv().await {
        match event {
            ResearchProgress::PhaseChanged { phase, .. } => phases.push(phase),
            ResearchProgress::Completed { .. } => {
                saw_completed = true;
                break;
            }
            ResearchProgress::Failed { error, .. } => panic!("unexpected failure: {error}"),
            _ => {}
        }
    }

    assert!(saw_completed);
    assert!(phases.contains(&Phase::Searching));
    assert!(phases.contains(&Phase::ReportGeneration));
    assert_eq!(*phases.last().unwrap(), Phase::Completed);
}

#[tokio::test]
async fn interactive_session_advances_one_iteration_per_continue_call() {
    let (orchestrator, _config) = build_test_orchestrator();
    let mut request = ResearchRequest::new("interactive query");
    request.max_iterations = 3;

    let session = orchestrator.start_interactive(request).await;
    assert_eq!(session.current_state().await.current_iteration, 0);

    session.add_query("a follow-up angle").await;
    let state = session.continue_().await.unwrap();
    assert_eq!(state.current_iteration, 1);
    assert!(!state.phase.is_terminal());

    let result = orchestrator.resume(&state.session_id).await.unwrap();
    assert!(result.report.contains("# Research Report"));
    assert!(session.is_complete().await);
}
