use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResearchDepth {
    Quick,
    Standard,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    Markdown,
    Plain,
    Structured,
}

/// Immutable input to a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default = "default_depth")]
    pub depth: ResearchDepth,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub search_provider_override: Option<String>,
    #[serde(default)]
    pub max_sources_per_iteration: Option<usize>,
    #[serde(default)]
    pub budget: Option<f64>,
}

fn default_depth() -> ResearchDepth {
    ResearchDepth::Standard
}
fn default_max_iterations() -> u32 {
    5
}
fn default_language() -> String {
    "en".to_string()
}
fn default_output_format() -> OutputFormat {
    OutputFormat::Markdown
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: default_depth(),
            max_iterations: default_max_iterations(),
            language: default_language(),
            output_format: default_output_format(),
            search_provider_override: None,
            max_sources_per_iteration: None,
            budget: None,
        }
    }
}
