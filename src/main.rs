use std::sync::Arc;
use std::time::Instant;

use deepscout::agents::{AnalysisAgent, ContentEnrichmentAgent, QueryPlannerAgent, ReportGeneratorAgent, SearchCoordinatorAgent};
use deepscout::cache::SearchResultCache;
use deepscout::chunk::ContentChunker;
use deepscout::error::ResearchError;
use deepscout::extract::ContentExtractor;
use deepscout::llm::{OpenAiCompatible, TextGeneration};
use deepscout::resilience::ResilientClient;
use deepscout::search::providers::{DuckDuckGoProvider, TavilyProvider};
use deepscout::search::ProviderFactory;
use deepscout::{Orchestrator, ResearchRequest, RuntimeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        eprintln!("Usage: deepscout <query>");
        eprintln!("\nEnv:");
        eprintln!("  OPENAI_API_KEY=...        (required for real synthesis; falls back to deterministic stubs otherwise)");
        eprintln!("  OPENAI_BASE_URL=...       (optional, default https://api.openai.com/v1)");
        eprintln!("  TAVILY_API_KEY=...        (optional, enables the Tavily provider)");
        eprintln!("  DEEPSCOUT_DEFAULT_PROVIDER=tavily|duckduckgo");
        eprintln!("  DEEPSCOUT_MAX_ITERATIONS=5");
        eprintln!("  DEEPSCOUT_MAX_BUDGET=...  (optional monetary cutoff)");
        std::process::exit(2);
    }

    let config = RuntimeConfig::from_env();
    let orchestrator = build_orchestrator(&config)?;

    let request = ResearchRequest::new(query);
    let started = Instant::now();
    let result = orchestrator.execute(request).await?;
    let elapsed = started.elapsed();

    println!("{}", result.report);
    eprintln!(
        "deepscout: {} iterations, {} sources, {} findings, ${:.4} cost, {:.1}s elapsed",
        result.iteration_count,
        result.sources.len(),
        result.findings.len(),
        result.cost,
        elapsed.as_secs_f64(),
    );

    Ok(())
}

fn build_orchestrator(config: &RuntimeConfig) -> Result<Arc<Orchestrator>, ResearchError> {
    let generator: Arc<dyn TextGeneration> = match &config.llm_api_key {
        Some(key) => Arc::new(OpenAiCompatible::openai(key.clone(), config.synthesis_model_id.clone())),
        None => Arc::new(OpenAiCompatible::local(config.llm_base_url.clone(), config.synthesis_model_id.clone())),
    };

    let planner = QueryPlannerAgent::new(Arc::clone(&generator));

    let mut factory = ProviderFactory::new(config.default_search_provider.clone());
    if let Some(key) = config.search_api_keys.get("tavily") {
        let client = ResilientClient::new(reqwest::Client::new(), config.http_timeout, config.max_retries, "tavily");
        factory.register(Arc::new(TavilyProvider::new(client, key.clone())));
    }
    factory.register(Arc::new(DuckDuckGoProvider::new(reqwest::Client::new())));
    if factory.get(&config.default_search_provider).is_err() {
        return Err(ResearchError::ProviderAuth {
            provider: config.default_search_provider.clone(),
            message: "configured default search provider is not registered (missing API key?)".to_string(),
        });
    }

    let coordinator = SearchCoordinatorAgent::new(Arc::new(factory), Arc::new(SearchResultCache::new()), config.max_parallel_searches);

    let extract_client = ResilientClient::new(reqwest::Client::new(), config.http_timeout, config.max_retries, "extractor");
    let extractor = Arc::new(ContentExtractor::new(extract_client, config.max_content_length, config.http_timeout));
    let chunker = Arc::new(ContentChunker::default());
    let enrichment = ContentEnrichmentAgent::new(extractor, chunker, config.max_parallel_extractions);

    let analysis = AnalysisAgent::new(Arc::clone(&generator), config.max_sources_to_analyze, config.sufficiency_threshold);
    let report = ReportGeneratorAgent::new(generator, config.max_sections);

    Ok(Orchestrator::new(config.clone(), planner, coordinator, enrichment, analysis, report))
}
