//! Completion Gateway
//!
//! Sends a single-turn query to the completion backend with a bounded
//! number of attempts. `try_complete` reports failure as a structured error;
//! `complete` folds exhaustion into a fixed reply text so callers always
//! have something to say back.

use crate::conversation::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reply text used when every attempt failed
pub const COMPLETION_FAILURE_REPLY: &str = "An error occurred while fetching data from OpenAI";

/// Errors from a completion backend
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode completion response: {0}")]
    Decode(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<CompletionError>,
    },
}

/// A text-completion service
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete a conversation, returning the reply text
    async fn complete(&self, messages: &[Turn]) -> Result<String, CompletionError>;
}

/// Bounded retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Delay before the second attempt (zero disables backoff)
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, as many times as given
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: usize) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

/// Completion gateway with bounded retry
#[derive(Clone)]
pub struct CompletionGateway {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl CompletionGateway {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            attempt_timeout: None,
        }
    }

    /// Bound each attempt; a timed-out attempt counts as a failure
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Query the backend, retrying transport/service failures
    ///
    /// A successful response is returned as-is, even when empty.
    pub async fn try_complete(&self, query: &str) -> Result<String, CompletionError> {
        let messages = [Turn::user(query)];
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Completion attempt {}/{}: query_len={}", attempt, max_attempts, query.len());

            let result = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, self.backend.complete(&messages))
                    .await
                    .unwrap_or(Err(CompletionError::Timeout(limit))),
                None => self.backend.complete(&messages).await,
            };

            match result {
                Ok(reply) => {
                    info!("Completion succeeded on attempt {}: reply_len={}", attempt, reply.len());
                    return Ok(reply);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!("Completion attempt {}/{} failed: {}", attempt, max_attempts, e);
                    return Err(CompletionError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "Completion attempt {}/{} failed: {} (retrying in {:?})",
                        attempt, max_attempts, e, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Query the backend; failure becomes the fixed failure reply
    pub async fn complete(&self, query: &str) -> String {
        match self.try_complete(query).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Completion failed: {}", e);
                COMPLETION_FAILURE_REPLY.to_string()
            }
        }
    }
}
