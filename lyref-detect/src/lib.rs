//! lyref-detect library interface
//!
//! Cultural reference extraction from lyric annotations:
//! prompt rendering, the retrying model gateway, reply extraction and
//! batch orchestration.

pub mod corpus;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod orchestrator;
pub mod prompt;

pub use crate::corpus::{run_files, ExecutionMode, FileJob};
pub use crate::error::{DetectError, DetectResult};
pub use crate::extract::{extract, FormatError};
pub use crate::gateway::{CompletionBackend, GatewayError, ModelError, ModelGateway, RetryPolicy};
pub use crate::orchestrator::ReferenceDetector;
pub use crate::prompt::{Prompt, PromptTemplate};
