//! Runtime configuration (SPEC_FULL.md §4.13): every option in the
//! distilled spec's §6 Configuration Surface table, loaded from the
//! environment with typed defaults the way the teacher's `core::config`
//! loads `cortex-scout.json` keys with env-var fallback.

use std::collections::HashMap;

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_str(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Provider id used when no per-request override is given.
    pub default_search_provider: String,
    /// provider-id → API key.
    pub search_api_keys: HashMap<String, String>,
    /// Orchestrator loop cap when the request doesn't specify one.
    pub default_max_iterations: u32,
    /// Cap on URLs enriched per iteration when the request doesn't specify one.
    pub default_max_sources_per_iteration: usize,
    /// Monetary cutoff, in the same units as the model price table.
    pub default_max_budget: Option<f64>,
    /// Overall sufficiency score at/above which the loop ends.
    pub sufficiency_threshold: f64,
    /// Provider fan-out.
    pub max_parallel_searches: usize,
    /// Content fetch fan-out.
    pub max_parallel_extractions: usize,
    pub analysis_model_id: String,
    pub synthesis_model_id: String,
    pub use_small_model_for_analysis: bool,
    /// Session map retention policy: sessions older than this are eligible
    /// for eviction by an external sweeper (the session map itself never
    /// evicts automatically — see SPEC_FULL.md §4.12).
    pub session_expiration: std::time::Duration,
    pub http_timeout: std::time::Duration,
    pub max_retries: u32,
    pub max_sources_to_analyze: usize,
    pub max_content_length: usize,
    pub max_sections: usize,
    pub include_references: bool,

    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let mut search_api_keys = HashMap::new();
        if let Some(k) = env_str("TAVILY_API_KEY") {
            search_api_keys.insert("tavily".to_string(), k);
        }

        Self {
            default_search_provider: env_str("DEEPSCOUT_DEFAULT_PROVIDER")
                .unwrap_or_else(|| "tavily".to_string()),
            search_api_keys,
            default_max_iterations: env_parsed("DEEPSCOUT_MAX_ITERATIONS", 5),
            default_max_sources_per_iteration: env_parsed("DEEPSCOUT_MAX_SOURCES_PER_ITERATION", 10),
            default_max_budget: env_str("DEEPSCOUT_MAX_BUDGET").and_then(|v| v.parse().ok()),
            sufficiency_threshold: env_parsed("DEEPSCOUT_SUFFICIENCY_THRESHOLD", 0.8),
            max_parallel_searches: env_parsed("DEEPSCOUT_MAX_PARALLEL_SEARCHES", 5),
            max_parallel_extractions: env_parsed("DEEPSCOUT_MAX_PARALLEL_EXTRACTIONS", 10),
            analysis_model_id: env_str("DEEPSCOUT_ANALYSIS_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            synthesis_model_id: env_str("DEEPSCOUT_SYNTHESIS_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            use_small_model_for_analysis: env_parsed("DEEPSCOUT_USE_SMALL_MODEL_FOR_ANALYSIS", true),
            session_expiration: std::time::Duration::from_secs(env_parsed("DEEPSCOUT_SESSION_EXPIRATION_SECS", 3600u64)),
            http_timeout: std::time::Duration::from_secs(env_parsed("DEEPSCOUT_HTTP_TIMEOUT_SECS", 30u64)),
            max_retries: env_parsed("DEEPSCOUT_MAX_RETRIES", 3),
            max_sources_to_analyze: env_parsed("DEEPSCOUT_MAX_SOURCES_TO_ANALYZE", 20),
            max_content_length: env_parsed("DEEPSCOUT_MAX_CONTENT_LENGTH", 50_000),
            max_sections: env_parsed("DEEPSCOUT_MAX_SECTIONS", 6),
            include_references: env_parsed("DEEPSCOUT_INCLUDE_REFERENCES", true),
            llm_base_url: env_str("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            llm_api_key: env_str("OPENAI_API_KEY"),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// model-id → price per 1K tokens (input+output blended), for coarse budget
/// accounting. Unknown model ids fall back to a conservative default.
pub fn price_per_1k_tokens(model_id: &str) -> f64 {
    match model_id {
        "gpt-4o-mini" => 0.00026,
        "gpt-4o" => 0.0075,
        "gpt-3.5-turbo" => 0.0015,
        _ => 0.002,
    }
}
