//! Batch orchestration
//!
//! Drives prompt → model → extraction over a corpus in one of two modes:
//! - [`ReferenceDetector::run`]: sequential, one call outstanding at a time,
//!   results appended in corpus order.
//! - [`ReferenceDetector::run_concurrent`]: bounded fan-out over every
//!   (song, annotation) pair, results appended in completion order.
//!
//! Both modes validate the whole corpus before the first model call.
//! A reply without a JSON block counts as an empty contribution; an
//! exhausted model call fails the batch.

use futures::stream::{self, StreamExt};
use lyref_common::config::TomlConfig;
use lyref_common::{validate_corpus, BatchResult, ExtractedReference};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{DetectError, DetectResult};
use crate::extract::extract;
use crate::gateway::{GatewayError, ModelGateway, OpenAiClient, RetryPolicy};
use crate::prompt::{Prompt, PromptTemplate};

/// Default fan-out bound for the concurrent mode
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Annotation-to-reference pipeline over one gateway
pub struct ReferenceDetector {
    template: PromptTemplate,
    gateway: ModelGateway,
    max_in_flight: usize,
}

impl ReferenceDetector {
    pub fn new(template: PromptTemplate, gateway: ModelGateway) -> Self {
        Self {
            template,
            gateway,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Assemble template, OpenAI client and retry policy from config
    pub fn from_config(config: &TomlConfig, api_key: String) -> DetectResult<Self> {
        config
            .validate()
            .map_err(|e| DetectError::Config(e.to_string()))?;

        let template = PromptTemplate::from_config(&config.prompt)?;

        let mut client = OpenAiClient::from_config(&config.model, api_key)?;
        if let Some(per_minute) = config.concurrency.requests_per_minute.and_then(NonZeroU32::new) {
            client = client.with_requests_per_minute(per_minute);
        }

        let gateway = ModelGateway::new(Arc::new(client), RetryPolicy::from_config(&config.retry));

        Ok(Self::new(template, gateway).with_max_in_flight(config.concurrency.max_in_flight))
    }

    /// Bound on outstanding calls in [`run_concurrent`](Self::run_concurrent); clamped to ≥ 1
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// One annotation through the model and the extractor
    async fn process(&self, prompt: &Prompt) -> Result<Vec<ExtractedReference>, GatewayError> {
        let reply = self.gateway.call(&prompt.text).await?;

        match extract(&reply) {
            Ok(references) => Ok(references),
            Err(e) => {
                warn!(
                    annotation = %prompt.source,
                    error = %e,
                    "No usable references in model reply, recording empty contribution"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Sequential mode
    ///
    /// Each call completes (or exhausts its retries) before the next is
    /// issued. The first exhausted call halts the batch.
    pub async fn run(&self, corpus: &[Value]) -> DetectResult<BatchResult> {
        let songs = validate_corpus(corpus)?;
        let start_time = Instant::now();

        info!(songs = songs.len(), mode = "sequential", "Starting reference detection");

        let mut output = BatchResult::new();
        for song in &songs {
            info!(song = %song.name, annotations = song.content.len(), "Processing song");
            output.register(song);

            for annotation in &song.content {
                let prompt = self.template.build_prompt(annotation);
                let references = self.process(&prompt).await.map_err(|e| {
                    error!(
                        song = %song.name,
                        annotation = %prompt.source,
                        error = %e,
                        "Halting batch"
                    );
                    e
                })?;
                debug!(song = %song.name, references = references.len(), "Annotation processed");
                output.append(&song.name, references);
            }
        }

        self.log_summary(&output, start_time);
        Ok(output)
    }

    /// Concurrent mode
    ///
    /// Prompts for every (song, annotation) pair are built up front and
    /// issued with at most `max_in_flight` outstanding. Every call runs to
    /// its own conclusion; if any failed, the batch is discarded and the
    /// first failure is returned. Otherwise results are folded in
    /// completion order.
    pub async fn run_concurrent(&self, corpus: &[Value]) -> DetectResult<BatchResult> {
        let songs = validate_corpus(corpus)?;
        let start_time = Instant::now();

        let jobs: Vec<(&str, Prompt)> = songs
            .iter()
            .flat_map(|song| {
                song.content.iter().map(move |annotation| {
                    (song.name.as_str(), self.template.build_prompt(annotation))
                })
            })
            .collect();
        let total = jobs.len();

        info!(
            songs = songs.len(),
            calls = total,
            max_in_flight = self.max_in_flight,
            mode = "concurrent",
            "Starting reference detection"
        );

        let results: Vec<(&str, Result<Vec<ExtractedReference>, GatewayError>)> =
            stream::iter(jobs)
                .map(|(song_name, prompt)| async move {
                    let result = self.process(&prompt).await;
                    if let Err(e) = &result {
                        error!(
                            song = %song_name,
                            annotation = %prompt.source,
                            error = %e,
                            "Model call failed"
                        );
                    }
                    (song_name, result)
                })
                .buffer_unordered(self.max_in_flight)
                .collect()
                .await;

        let mut completed = Vec::with_capacity(total);
        let mut failed = 0;
        let mut first_failure = None;
        for (song_name, result) in results {
            match result {
                Ok(references) => completed.push((song_name, references)),
                Err(e) => {
                    failed += 1;
                    first_failure.get_or_insert(e);
                }
            }
        }

        if let Some(first) = first_failure {
            error!(failed, total, "Concurrent batch failed, discarding results");
            return Err(DetectError::FanOut {
                failed,
                total,
                first,
            });
        }

        let mut output = BatchResult::for_songs(&songs);
        for (song_name, references) in completed {
            output.append(song_name, references);
        }

        self.log_summary(&output, start_time);
        Ok(output)
    }

    /// Sequential mode for synchronous callers
    ///
    /// Runs [`run`](Self::run) on a private current-thread runtime, so each
    /// model call blocks the calling thread. Must not be called from inside
    /// an async runtime.
    pub fn run_blocking(&self, corpus: &[Value]) -> DetectResult<BatchResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(corpus))
    }

    fn log_summary(&self, output: &BatchResult, start_time: Instant) {
        info!(
            songs = output.len(),
            references = output.reference_count(),
            model_attempts = self.gateway.attempts_issued(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Reference detection complete"
        );
    }
}
