//! Model gateway
//!
//! Wraps one remote completion call in the run's [`RetryPolicy`]. The
//! transport is pluggable through [`CompletionBackend`]; both batch modes go
//! through [`ModelGateway::call`].

pub mod openai;
pub mod retry;

pub use openai::OpenAiClient;
pub use retry::{Exhausted, RetryPolicy};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// A single failed attempt against the completion service
///
/// Every variant is retried by the gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Completion contained no text")]
    EmptyCompletion,
}

/// A model call that cannot produce a reply
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Attempt ceiling reached
    #[error("Model call failed after {attempts} attempts (retries exhausted): {last}")]
    RetriesExhausted { attempts: u32, last: ModelError },

    /// Gateway could not be set up (client construction, credentials)
    #[error("Model gateway unavailable: {0}")]
    Permanent(String),
}

/// Remote text-completion transport
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Submit one prompt as a single user message and return the reply text
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Resilience wrapper around a [`CompletionBackend`]
///
/// No caching: identical prompts are sent again.
pub struct ModelGateway {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
    /// Attempts issued, i.e. remote quota consumed
    attempts: AtomicU64,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Total attempts issued through this gateway
    pub fn attempts_issued(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Send `prompt`, retrying per policy
    ///
    /// Exhausting the policy is returned as [`GatewayError::RetriesExhausted`],
    /// never swallowed.
    pub async fn call(&self, prompt: &str) -> Result<String, GatewayError> {
        debug!(
            backend = self.backend.name(),
            prompt_chars = prompt.len(),
            "Calling completion model"
        );

        let reply = self
            .policy
            .run(|_attempt| {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                self.backend.complete(prompt)
            })
            .await
            .map_err(|exhausted| {
                error!(
                    backend = self.backend.name(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last,
                    "Model call retries exhausted"
                );
                GatewayError::RetriesExhausted {
                    attempts: exhausted.attempts,
                    last: exhausted.last,
                }
            })?;

        debug!(reply_chars = reply.len(), "Completion received");
        Ok(reply)
    }
}
