//! Hand-rolled circuit breaker (SPEC_FULL.md §4.4), grounded in the
//! `Arc<RwLock<...>>` shared-state pattern the teacher uses for its proxy
//! pool (`features/proxy_manager.rs`) — no pack example ships a circuit
//! breaker crate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

const SAMPLING_WINDOW: Duration = Duration::from_secs(30);
const MIN_OBSERVED_REQUESTS: usize = 5;
const FAILURE_RATIO_TRIP: f64 = 0.5;
const BREAK_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Observation {
    at: Instant,
    success: bool,
}

#[derive(Debug)]
enum BreakerState {
    Closed,
    Open { since: Instant },
}

pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    observations: RwLock<VecDeque<Observation>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { state: RwLock::new(BreakerState::Closed), observations: RwLock::new(VecDeque::new()) }
    }

    /// Returns `true` when calls should fail fast with `CircuitOpen`.
    pub async fn is_open(&self) -> bool {
        let mut state = self.state.write().await;
        if let BreakerState::Open { since } = *state {
            if since.elapsed() >= BREAK_DURATION {
                *state = BreakerState::Closed;
                self.observations.write().await.clear();
                return false;
            }
            return true;
        }
        false
    }

    pub async fn record(&self, success: bool) {
        let now = Instant::now();
        let mut obs = self.observations.write().await;
        obs.push_back(Observation { at: now, success });
        while let Some(front) = obs.front() {
            if now.duration_since(front.at) > SAMPLING_WINDOW {
                obs.pop_front();
            } else {
                break;
            }
        }

        if obs.len() < MIN_OBSERVED_REQUESTS {
            return;
        }

        let failures = obs.iter().filter(|o| !o.success).count();
        let ratio = failures as f64 / obs.len() as f64;
        if ratio >= FAILURE_RATIO_TRIP {
            *self.state.write().await = BreakerState::Open { since: now };
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stays_closed_below_min_observations() {
        let cb = CircuitBreaker::new();
        for _ in 0..4 {
            cb.record(false).await;
        }
        assert!(!cb.is_open().await);
    }

    #[tokio::test]
    async fn trips_at_failure_ratio_threshold() {
        let cb = CircuitBreaker::new();
        for _ in 0..3 {
            cb.record(false).await;
        }
        for _ in 0..2 {
            cb.record(true).await;
        }
        assert!(cb.is_open().await);
    }

    #[tokio::test]
    async fn stays_closed_below_failure_ratio() {
        let cb = CircuitBreaker::new();
        for _ in 0..1 {
            cb.record(false).await;
        }
        for _ in 0..4 {
            cb.record(true).await;
        }
        assert!(!cb.is_open().await);
    }
}
