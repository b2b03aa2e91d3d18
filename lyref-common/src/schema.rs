//! Corpus and reference schema validation
//!
//! Input songs come from the annotation collector as untyped JSON; replies from
//! the completion model are decoded into untyped records. Both pass through here
//! before anything downstream touches them.
//!
//! Failure severity differs by side:
//! - A malformed song is a [`SchemaError`] and aborts the batch.
//! - A malformed reference record is a [`RecordError`]; the caller logs and drops it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One lyric excerpt paired with its human explanation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Annotation {
    /// Annotated lyric excerpt
    pub lyrics: String,
    /// Human-written explanation of the excerpt (may be empty)
    pub annotation: String,
    /// Where the annotation was collected from
    pub source: String,
}

/// A named song and its annotations, in page order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Song {
    pub name: String,
    pub content: Vec<Annotation>,
    /// Where the full lyrics were collected from
    #[serde(alias = "lyrics source")]
    pub lyrics_source: String,
}

/// Category of a cultural reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Person,
    Group,
    Artwork,
    Event,
    Place,
    Phrase,
    Brand,
}

impl ReferenceType {
    /// Every accepted tag, in canonical order
    pub const ALL: [ReferenceType; 7] = [
        ReferenceType::Person,
        ReferenceType::Group,
        ReferenceType::Artwork,
        ReferenceType::Event,
        ReferenceType::Place,
        ReferenceType::Phrase,
        ReferenceType::Brand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Person => "person",
            ReferenceType::Group => "group",
            ReferenceType::Artwork => "artwork",
            ReferenceType::Event => "event",
            ReferenceType::Place => "place",
            ReferenceType::Phrase => "phrase",
            ReferenceType::Brand => "brand",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceType {
    type Err = RecordError;

    /// Exact, case-sensitive match against the seven tags. No coercion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferenceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RecordError::UnknownType(s.to_string()))
    }
}

/// One validated reference returned by the model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractedReference {
    /// Name of the referenced entity
    pub entity: String,
    #[serde(rename = "type")]
    pub kind: ReferenceType,
    /// Why and where the entity is referenced
    pub description: String,
}

/// Input corpus shape violation (fatal to the batch)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Schema error in song #{index}{}: {message}", display_name(.name))]
pub struct SchemaError {
    /// Position of the offending record in the corpus
    pub index: usize,
    /// Song name, when the record carried a readable one
    pub name: Option<String>,
    pub message: String,
}

fn display_name(name: &Option<String>) -> String {
    name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default()
}

/// A single decoded reference record failed validation (never fatal)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` must be a string")]
    NotAString(&'static str),

    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("unknown reference type `{0}`")]
    UnknownType(String),
}

/// Validate one raw corpus record into a [`Song`]
///
/// `index` is the record's position in the corpus, used for diagnostics only.
pub fn validate_song(raw: &Value, index: usize) -> Result<Song, SchemaError> {
    Song::deserialize(raw).map_err(|e| SchemaError {
        index,
        name: raw.get("name").and_then(Value::as_str).map(str::to_string),
        message: e.to_string(),
    })
}

/// Validate a whole corpus, stopping at the first malformed song
pub fn validate_corpus(raw: &[Value]) -> Result<Vec<Song>, SchemaError> {
    raw.iter()
        .enumerate()
        .map(|(index, record)| validate_song(record, index))
        .collect()
}

/// Validate one decoded model record into an [`ExtractedReference`]
///
/// Accepts iff `entity` and `description` are non-empty strings and `type`
/// is one of the seven [`ReferenceType`] tags. Extra fields are ignored.
pub fn validate_reference(raw: &Value) -> Result<ExtractedReference, RecordError> {
    let record = raw.as_object().ok_or(RecordError::NotAnObject)?;

    let text_field = |field: &'static str| -> Result<String, RecordError> {
        let value = record.get(field).ok_or(RecordError::MissingField(field))?;
        let text = value.as_str().ok_or(RecordError::NotAString(field))?;
        if text.trim().is_empty() {
            return Err(RecordError::EmptyField(field));
        }
        Ok(text.to_string())
    };

    let entity = text_field("entity")?;
    let kind = record
        .get("type")
        .ok_or(RecordError::MissingField("type"))?
        .as_str()
        .ok_or(RecordError::NotAString("type"))?
        .parse::<ReferenceType>()?;
    let description = text_field("description")?;

    Ok(ExtractedReference {
        entity,
        kind,
        description,
    })
}
