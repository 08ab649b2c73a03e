//! HTTP Resilience Layer (SPEC_FULL.md §4.4): per-request timeout,
//! exponential-backoff-with-jitter retry, and a circuit breaker, composed in
//! the order the spec names in §9: cache lookup happens above this layer;
//! here it's circuit-breaker gate, then timed call with retry.

mod circuit_breaker;
pub use circuit_breaker::CircuitBreaker;

use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use rand::Rng;

use crate::error::ResearchError;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Wraps a `reqwest::Client` with the retry/timeout/circuit-breaker policy
/// shared by every provider and the content extractor.
pub struct ResilientClient {
    client: reqwest::Client,
    breaker: CircuitBreaker,
    timeout: Duration,
    max_retries: u32,
    label: String,
}

impl ResilientClient {
    pub fn new(client: reqwest::Client, timeout: Duration, max_retries: u32, label: impl Into<String>) -> Self {
        Self { client, breaker: CircuitBreaker::new(), timeout, max_retries, label: label.into() }
    }

    /// `build` constructs a fresh `reqwest::Request` on each attempt (a
    /// request can't generally be replayed once consumed).
    pub async fn execute<F>(&self, build: F) -> Result<reqwest::Response, ResearchError>
    where
        F: Fn(&reqwest::Client) -> Result<reqwest::Request, ResearchError>,
    {
        if self.breaker.is_open().await {
            return Err(ResearchError::CircuitOpen(self.label.clone()));
        }

        // Total budget: bounded by 2x the per-request timeout across retries.
        let budget = self.timeout * 2;
        let backoff_policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(INITIAL_RETRY_DELAY)
            .with_max_elapsed_time(Some(budget))
            .build();

        let attempt = retry(backoff_policy, || async {
            let req = build(&self.client).map_err(backoff::Error::permanent)?;
            match self.client.execute(req).await {
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    Err(backoff::Error::transient(ResearchError::RateLimited { provider: self.label.clone() }))
                }
                Ok(resp) if is_retryable_status(resp.status()) => {
                    Err(backoff::Error::transient(ResearchError::Transport(format!("http {}", resp.status()))))
                }
                Ok(resp) => Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => Err(backoff::Error::transient(ResearchError::from(e))),
                Err(e) => Err(backoff::Error::permanent(ResearchError::from(e))),
            }
        })
        .await;

        self.breaker.record(attempt.is_ok()).await;

        match attempt {
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                    return Err(ResearchError::ProviderAuth { provider: self.label.clone(), message: format!("http {status}") });
                }
                Ok(resp)
            }
            Err(e) => Err(e),
        }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// 2s baseline + Uniform[500, 1500] ms jitter, used by the scraped-HTML
/// provider's bot-protection retry (SPEC_FULL.md §4.2).
pub fn bot_protection_jitter() -> Duration {
    let extra = rand::rng().random_range(500..=1500);
    Duration::from_millis(2000 + extra)
}

/// 1.5-2.5s jitter between sequential queries in a scraped-HTML batch.
pub fn sequential_batch_jitter() -> Duration {
    let millis = rand::rng().random_range(1500..=2500);
    Duration::from_millis(millis)
}
