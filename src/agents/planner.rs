//! Query Planner Agent (SPEC_FULL.md §4.7): decompose → discover
//! perspectives → expand into search queries, each with a deterministic
//! fallback, grounded on the hop-based query expansion in the teacher's
//! `tools/deep_research.rs` but generalized into three explicit structured
//! LLM calls instead of one ad hoc pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{generate_structured, GenerationOptions, TextGeneration};
use crate::types::{ExpandedQuery, SearchType};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubQuestion {
    pub id: String,
    pub text: String,
    pub intent: String,
    pub priority: u8,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Perspective {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
}

#[derive(Deserialize)]
struct SubQuestionsResponse {
    sub_questions: Vec<SubQuestion>,
}

#[derive(Deserialize)]
struct PerspectivesResponse {
    perspectives: Vec<Perspective>,
}

#[derive(Deserialize)]
struct ExpandedQueriesResponse {
    queries: Vec<ExpandedQuery>,
}

pub struct PlannerOptions {
    pub max_expanded_queries: usize,
    pub include_news: bool,
    pub include_academic: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self { max_expanded_queries: 10, include_news: false, include_academic: false }
    }
}

pub struct QueryPlannerAgent {
    generator: Arc<dyn TextGeneration>,
}

impl QueryPlannerAgent {
    pub fn new(generator: Arc<dyn TextGeneration>) -> Self {
        Self { generator }
    }

    pub async fn decompose(&self, query: &str, language: &str, hints: &[String]) -> Vec<SubQuestion> {
        let hint_block = if hints.is_empty() { String::new() } else { format!("\nPrior information gaps to address:\n- {}", hints.join("\n- ")) };
        let prompt = format!(
            "Decompose this research query into 5 to 8 searchable sub-questions in {language}.\n\
             Query: {query}{hint_block}\n\
             Respond as JSON: {{\"sub_questions\": [{{\"id\": str, \"text\": str, \"intent\": str, \"priority\": 1-3, \"depends_on\": [str]}}]}}"
        );

        let opts = GenerationOptions::with_temperature(0.3);
        match generate_structured::<SubQuestionsResponse>(self.generator.as_ref(), &prompt, opts).await {
            Ok(Some(resp)) if !resp.sub_questions.is_empty() => resp.sub_questions,
            _ => vec![SubQuestion { id: "sq-0".to_string(), text: query.to_string(), intent: "general".to_string(), priority: 1, depends_on: Vec::new() }],
        }
    }

    pub async fn discover_perspectives(&self, query: &str, sub_questions: &[SubQuestion]) -> Vec<Perspective> {
        let sq_list = sub_questions.iter().map(|s| s.text.clone()).collect::<Vec<_>>().join("; ");
        let prompt = format!(
            "Identify 3 to 5 distinct research perspectives (STORM-style) for investigating: {query}\n\
             Sub-questions already identified: {sq_list}\n\
             Respond as JSON: {{\"perspectives\": [{{\"id\": str, \"name\": str, \"description\": str, \"key_topics\": [str]}}]}}"
        );

        let opts = GenerationOptions::with_temperature(0.5);
        match generate_structured::<PerspectivesResponse>(self.generator.as_ref(), &prompt, opts).await {
            Ok(Some(resp)) if !resp.perspectives.is_empty() => resp.perspectives,
            _ => vec![Perspective { id: "persp-0".to_string(), name: "Overview".to_string(), description: "A general overview perspective".to_string(), key_topics: Vec::new() }],
        }
    }

    pub async fn expand_queries(&self, query: &str, sub_questions: &[SubQuestion], perspectives: &[Perspective], opts: &PlannerOptions) -> Vec<ExpandedQuery> {
        let prompt = format!(
            "Original query: {query}\n\
             Sub-questions: {}\n\
             Perspectives: {}\n\
             Produce up to {} engine-optimized search queries. Each needs text, intent, priority (1-3), \
             searchType ({}), and optional perspectiveId/subQuestionId.\n\
             Respond as JSON: {{\"queries\": [{{\"text\": str, \"intent\": str, \"priority\": 1-3, \"search_type\": \"Web\"|\"News\"|\"Academic\", \"perspective_id\": str|null, \"sub_question_id\": str|null}}]}}",
            sub_questions.iter().map(|s| s.text.clone()).collect::<Vec<_>>().join("; "),
            perspectives.iter().map(|p| p.name.clone()).collect::<Vec<_>>().join(", "),
            opts.max_expanded_queries,
            allowed_search_types(opts),
        );

        let gen_opts = GenerationOptions::with_temperature(0.4);
        let mut queries = match generate_structured::<ExpandedQueriesResponse>(self.generator.as_ref(), &prompt, gen_opts).await {
            Ok(Some(resp)) if !resp.queries.is_empty() => resp.queries,
            _ => fallback_expanded_queries(query, sub_questions),
        };

        queries.retain(|q| match q.search_type {
            SearchType::News => opts.include_news,
            SearchType::Academic => opts.include_academic,
            SearchType::Web => true,
        });
        queries.sort_by_key(|q| q.priority);
        queries.truncate(opts.max_expanded_queries);
        queries
    }

    /// Runs all three steps and returns the final, priority-sorted plan.
    pub async fn plan(&self, query: &str, language: &str, hints: &[String], opts: &PlannerOptions) -> Vec<ExpandedQuery> {
        let sub_questions = self.decompose(query, language, hints).await;
        let perspectives = self.discover_perspectives(query, &sub_questions).await;
        self.expand_queries(query, &sub_questions, &perspectives, opts).await
    }
}

fn allowed_search_types(opts: &PlannerOptions) -> String {
    let mut types = vec!["Web"];
    if opts.include_news {
        types.push("News");
    }
    if opts.include_academic {
        types.push("Academic");
    }
    types.join("|")
}

fn fallback_expanded_queries(query: &str, sub_questions: &[SubQuestion]) -> Vec<ExpandedQuery> {
    let mut out = vec![ExpandedQuery { text: query.to_string(), intent: "original".to_string(), priority: 1, search_type: SearchType::Web, perspective_id: None, sub_question_id: None }];
    for sq in sub_questions.iter().take(5) {
        out.push(ExpandedQuery { text: sq.text.clone(), intent: sq.intent.clone(), priority: sq.priority, search_type: SearchType::Web, perspective_id: None, sub_question_id: Some(sq.id.clone()) });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_includes_original_query_first() {
        let sqs = vec![SubQuestion { id: "sq-0".to_string(), text: "a".to_string(), intent: "x".to_string(), priority: 2, depends_on: vec![] }];
        let fallback = fallback_expanded_queries("original query", &sqs);
        assert_eq!(fallback[0].text, "original query");
        assert_eq!(fallback.len(), 2);
    }
}
