//! # lyref common library
//!
//! Shared code for the lyref crates:
//! - Song/annotation input schema and reference validation
//! - Batch result aggregate
//! - Reference graph assembly
//! - Configuration loading

pub mod batch;
pub mod config;
pub mod error;
pub mod graph;
pub mod schema;

pub use batch::{BatchResult, SongReferences};
pub use error::{Error, Result};
pub use schema::{
    validate_corpus, validate_reference, validate_song, Annotation, ExtractedReference,
    RecordError, ReferenceType, SchemaError, Song,
};
