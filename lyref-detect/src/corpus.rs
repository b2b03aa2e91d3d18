//! Corpus files in, result files out
//!
//! Input is a JSON list of songs; output is the per-song result object,
//! pretty-printed with non-ASCII text written as-is.

use clap::ValueEnum;
use lyref_common::graph::Namespace;
use lyref_common::BatchResult;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{DetectError, DetectResult};
use crate::orchestrator::ReferenceDetector;

/// How a batch is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// One model call at a time, in corpus order
    Sequential,
    /// Bounded fan-out over all annotations
    Concurrent,
}

/// Where one run reads from and writes to
#[derive(Debug, Clone)]
pub struct FileJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Also write the reference graph here
    pub graph: Option<PathBuf>,
}

fn file_error(path: &Path, message: impl ToString) -> DetectError {
    DetectError::File {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Read a corpus file as a list of raw song records
///
/// Records are not validated here; the orchestrator does that.
pub fn read_corpus(path: &Path) -> DetectResult<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| file_error(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| file_error(path, format!("corpus is not a JSON list: {}", e)))
}

/// Write `value` as pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> DetectResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| file_error(parent, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| file_error(path, e))?;
    std::fs::write(path, content).map_err(|e| file_error(path, e))
}

/// Read the corpus, run the batch and write the result (and graph)
///
/// Nothing is written when the batch fails.
pub async fn run_files(
    detector: &ReferenceDetector,
    mode: ExecutionMode,
    job: &FileJob,
) -> DetectResult<BatchResult> {
    let corpus = read_corpus(&job.input)?;
    info!(input = %job.input.display(), songs = corpus.len(), ?mode, "Corpus loaded");

    let result = match mode {
        ExecutionMode::Sequential => detector.run(&corpus).await?,
        ExecutionMode::Concurrent => detector.run_concurrent(&corpus).await?,
    };

    write_json(&job.output, &result)?;
    info!(output = %job.output.display(), "References written");

    if let Some(graph_path) = &job.graph {
        let namespace = Namespace::from_batch(&result);
        write_json(graph_path, &namespace)?;
        info!(
            output = %graph_path.display(),
            entities = namespace.entities.len(),
            edges = namespace.edges.len(),
            "Reference graph written"
        );
    }

    Ok(result)
}
