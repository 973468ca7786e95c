/// Polling utilities for waiting on conditions with timeout
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{Error, Result};

/// State reported on timeout when no attempt has completed
const UNKNOWN_STATE: &str = "Unknown";

/// Outcome of a single polling attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Condition met, stop polling
    Ready(T),
    /// Condition not met yet; carries the observed state for reporting
    NotYet(String),
}

/// Configuration for polling operations
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub description: String,
}

impl PollingConfig {
    /// Create a new polling configuration
    pub fn new(timeout: Duration, interval: Duration, description: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            description: description.into(),
        }
    }

    /// Poll until condition is met or timeout
    ///
    /// The condition function should return:
    /// - Ok(Attempt::Ready(T)) when condition is met (returns T)
    /// - Ok(Attempt::NotYet(state)) when condition is not yet met (continues polling)
    /// - Err(e) when an error occurs (stops polling and returns error)
    pub async fn poll<F, Fut, T>(&self, mut condition: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        info!("{}...", self.description);

        let start = Instant::now();
        let mut last_state = UNKNOWN_STATE.to_string();

        loop {
            // A single attempt may not outlive the deadline either
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let attempt = match tokio::time::timeout(remaining, condition()).await {
                Ok(attempt) => attempt?,
                Err(_) => return Err(self.timed_out(last_state)),
            };

            match attempt {
                Attempt::Ready(value) => {
                    info!("✓ {}", self.description);
                    return Ok(value);
                }
                Attempt::NotYet(state) => last_state = state,
            }

            if start.elapsed() >= self.timeout {
                return Err(self.timed_out(last_state));
            }

            // Wait before next attempt
            tokio::time::sleep(self.interval).await;
        }
    }

    fn timed_out(&self, last_state: String) -> Error {
        Error::Timeout {
            description: self.description.clone(),
            timeout: self.timeout,
            last_phase: last_state,
        }
    }
}
