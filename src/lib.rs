pub mod agents;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod orchestrator;
pub mod resilience;
pub mod search;
pub mod types;

pub use config::RuntimeConfig;
pub use error::{RecordedError, ResearchError};
pub use orchestrator::{Orchestrator, ResearchProgress, Session};
pub use types::{Phase, ResearchRequest, ResearchResult, ResearchState};
