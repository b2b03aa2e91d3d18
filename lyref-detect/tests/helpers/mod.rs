//! Shared test fixtures: scripted completion backend and corpus builders

#![allow(dead_code)]

use async_trait::async_trait;
use lyref_detect::{
    CompletionBackend, ModelError, ModelGateway, PromptTemplate, ReferenceDetector, RetryPolicy,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the backend answers a given annotation
#[derive(Debug, Clone)]
pub enum Script {
    /// Answer every attempt with this text
    Reply(String),
    /// Fail the first `n` attempts, then answer
    FailThenReply(u32, String),
    /// Fail every attempt
    Fail,
}

/// Completion backend keyed by the lyric line of the rendered prompt
///
/// Use with [`test_template`], which puts the lyrics on the first line.
pub struct ScriptedBackend {
    scripts: HashMap<String, Script>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn script(mut self, lyrics: &str, script: Script) -> Self {
        self.scripts.insert(lyrics.to_string(), script);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Lyric keys of every attempt, in issue order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, key: &str) -> Result<String, ModelError> {
        match self.scripts.get(key) {
            Some(Script::Reply(text)) => Ok(text.clone()),
            Some(Script::FailThenReply(n, text)) => {
                let mut failures = self.failures.lock().unwrap();
                let seen = failures.entry(key.to_string()).or_insert(0);
                if *seen < *n {
                    *seen += 1;
                    Err(ModelError::Network(format!("scripted failure for {key}")))
                } else {
                    Ok(text.clone())
                }
            }
            Some(Script::Fail) => Err(ModelError::Api {
                status: 503,
                body: format!("scripted outage for {key}"),
            }),
            None => Ok(fenced(&[])),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let key = prompt.lines().next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(key.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answer(&key)
    }
}

/// Template whose rendered prompt starts with the lyric line
pub fn test_template() -> PromptTemplate {
    PromptTemplate::new("", "", "[TARGET LYRICS]\n[HUMAN ANNOTATION]").unwrap()
}

/// Retry policy with 1 ms time units
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::default().with_unit(Duration::from_millis(1))
}

pub fn detector(backend: Arc<ScriptedBackend>) -> ReferenceDetector {
    detector_with_policy(backend, fast_policy())
}

pub fn detector_with_policy(
    backend: Arc<ScriptedBackend>,
    policy: RetryPolicy,
) -> ReferenceDetector {
    ReferenceDetector::new(test_template(), ModelGateway::new(backend, policy))
}

/// Model reply with a fenced JSON block of `(entity, type, description)` records
pub fn fenced(records: &[(&str, &str, &str)]) -> String {
    let list: Vec<Value> = records
        .iter()
        .map(|(entity, kind, description)| {
            json!({"entity": entity, "type": kind, "description": description})
        })
        .collect();
    format!(
        "Sure, here is the analysis.\n```json\n{}\n```\n",
        serde_json::to_string_pretty(&list).unwrap()
    )
}

/// Corpus record; each annotation's lyrics double as its script key
pub fn song(name: &str, lyrics: &[&str]) -> Value {
    let content: Vec<Value> = lyrics
        .iter()
        .map(|l| {
            json!({
                "lyrics": l,
                "annotation": format!("explanation of {l}"),
                "source": format!("https://genius.com/annotations/{l}"),
            })
        })
        .collect();
    json!({
        "name": name,
        "content": content,
        "lyrics_source": format!("https://genius.com/{name}-lyrics"),
    })
}
