//! OpenAI-compatible chat completions client
//!
//! One request per attempt: a single user message holding the rendered
//! prompt, a fixed model identifier and a fixed temperature. The reply is the
//! first choice's message content.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lyref_common::config::ModelConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use super::{CompletionBackend, GatewayError, ModelError};

const USER_AGENT: &str = concat!("lyref/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completions client
pub struct OpenAiClient {
    http_client: Client,
    /// `{base_url}/chat/completions`
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    /// Optional quota, awaited before every attempt
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Permanent(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            temperature,
            rate_limiter: None,
        })
    }

    /// Build from the `[model]` config section
    pub fn from_config(config: &ModelConfig, api_key: String) -> Result<Self, GatewayError> {
        Self::new(
            &config.base_url,
            api_key,
            config.name.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Throttle attempts to at most `per_minute` requests per minute
    pub fn with_requests_per_minute(mut self, per_minute: NonZeroU32) -> Self {
        self.rate_limiter = Some(RateLimiter::direct(Quota::per_minute(per_minute)));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Sending chat completion request");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::EmptyCompletion)
    }
}
