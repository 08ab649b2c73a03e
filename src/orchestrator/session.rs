//! Interactive sessions (SPEC_FULL.md §4.12, §6 facade, §9 Open Questions).
//!
//! The source's `continue`/`addQuery` stubs don't advance the state
//! machine; here each `continue_()` runs exactly one
//! `Planning → SufficiencyEvaluation` iteration (using accumulated hints as
//! planner input) and `addQuery` appends a hint consumed on the next call.

use tokio::sync::Mutex;

use crate::error::ResearchError;
use crate::types::{Phase, ResearchCheckpoint, ResearchResult, ResearchState};

use super::Orchestrator;

pub struct Session {
    state: Mutex<ResearchState>,
    checkpoint_number: Mutex<u32>,
    orchestrator: std::sync::Weak<Orchestrator>,
}

impl Session {
    pub(super) fn new(state: ResearchState, orchestrator: std::sync::Weak<Orchestrator>) -> Self {
        Self { state: Mutex::new(state), checkpoint_number: Mutex::new(0), orchestrator }
    }

    pub async fn current_state(&self) -> ResearchState {
        self.state.lock().await.clone()
    }

    pub async fn is_complete(&self) -> bool {
        self.state.lock().await.phase.is_terminal()
    }

    pub async fn get_checkpoint(&self) -> ResearchCheckpoint {
        let mut n = self.checkpoint_number.lock().await;
        *n += 1;
        let state = self.state.lock().await;
        ResearchCheckpoint::from_state(&state, *n)
    }

    /// Appends a user-supplied sub-question as an additional planner hint,
    /// consumed on the next `continue_()` call.
    pub async fn add_query(&self, text: impl Into<String>) {
        self.state.lock().await.pending_hints.push(text.into());
    }

    /// Runs exactly one `Planning → SufficiencyEvaluation` iteration. A
    /// no-op (returns the current state unchanged) once the session has
    /// reached a terminal phase.
    pub async fn continue_(&self) -> Result<ResearchState, ResearchError> {
        let orchestrator = self.orchestrator.upgrade().ok_or_else(|| ResearchError::Internal("orchestrator dropped".to_string()))?;

        let mut state = self.state.lock().await;
        if state.phase.is_terminal() {
            return Ok(state.clone());
        }

        orchestrator.run_iteration(&mut state).await?;
        Ok(state.clone())
    }

    /// Forces the session straight to `ReportGeneration → Completed`.
    pub async fn finalize(&self) -> Result<ResearchResult, ResearchError> {
        let orchestrator = self.orchestrator.upgrade().ok_or_else(|| ResearchError::Internal("orchestrator dropped".to_string()))?;

        let mut state = self.state.lock().await;
        let report = if state.phase == Phase::Completed {
            orchestrator.render_report(&state)
        } else {
            orchestrator.generate_report(&mut state).await?
        };
        Ok(ResearchResult::from_state(&state, report))
    }
}
