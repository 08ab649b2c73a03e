//! Error taxonomy shared across the whole pipeline (SPEC_FULL.md §4.14, §7).

use thiserror::Error;

/// Hard errors: any of these can end a run (transition the state machine to
/// `Failed`) when they occur somewhere a phase cannot produce partial output.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider auth error ({provider}): {message}")]
    ProviderAuth { provider: String, message: String },

    #[error("rate limited by {provider} after exhausting retry budget")]
    RateLimited { provider: String },

    #[error("provider {0} not found; available: {1}")]
    ProviderNotFound(String, String),

    #[error("circuit open for {0}")]
    CircuitOpen(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("budget exceeded")]
    BudgetExceeded,

    #[error("iteration limit reached")]
    IterationLimitReached,

    #[error("cancelled")]
    Cancelled,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ResearchError {
    fn from(e: reqwest::Error) -> Self {
        ResearchError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ResearchError {
    fn from(e: serde_json::Error) -> Self {
        ResearchError::Parse(e.to_string())
    }
}

/// Soft errors: recorded on `state.errors` without failing the run.
/// Distinct from [`ResearchError`] because a soft error never propagates as
/// a `Result::Err` out of a phase — it's appended to state and swallowed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecordedError {
    pub phase: String,
    pub message: String,
    pub source_kind: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl RecordedError {
    pub fn new(phase: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            source_kind: kind.into(),
            message: message.into(),
            at: chrono::Utc::now(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;
