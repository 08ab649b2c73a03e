use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SearchType {
    Web,
    News,
    Academic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SearchDepth {
    Basic,
    Deep,
}

/// Output of the Query Planner's query-expansion step (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedQuery {
    pub text: String,
    pub intent: String,
    /// 1 is highest priority.
    pub priority: u8,
    pub search_type: SearchType,
    pub perspective_id: Option<String>,
    pub sub_question_id: Option<String>,
}

/// Input to a search provider (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub search_type: SearchType,
    pub depth: SearchDepth,
    pub max_results: usize,
    pub include_raw_content: bool,
    #[serde(default)]
    pub include_domains: Vec<String>,
    #[serde(default)]
    pub exclude_domains: Vec<String>,
}

impl SearchQuery {
    pub fn from_expanded(eq: &ExpandedQuery, max_results: usize, depth: SearchDepth) -> Self {
        Self {
            text: eq.text.clone(),
            search_type: eq.search_type,
            depth,
            max_results,
            include_raw_content: false,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        }
    }
}
