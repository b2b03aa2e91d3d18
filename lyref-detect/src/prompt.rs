//! Reference detection prompt rendering
//!
//! A prompt is `prefix + fewshot + task`, where `task` carries two markers
//! replaced with the annotation's lyric excerpt and explanation. Substitution
//! is plain text replacement: lyrics first, then annotation, every occurrence.
//! Input text is not escaped, so an excerpt that itself contains
//! [`ANNOTATION_MARKER`] will have that text replaced in the second pass.

use lyref_common::config::PromptConfig;
use lyref_common::Annotation;
use thiserror::Error;

/// Replaced with [`Annotation::lyrics`]
pub const LYRICS_MARKER: &str = "[TARGET LYRICS]";
/// Replaced with [`Annotation::annotation`]
pub const ANNOTATION_MARKER: &str = "[HUMAN ANNOTATION]";

const DEFAULT_PREFIX: &str = r#"
You are a music and culture expert. Read the song lyrics and the explanation
written for them, and identify every cultural reference they contain.

[REQUIREMENTS]
- List each cultural reference found in the lyrics. A reference has one of these types:
    - person: musicians, celebrities, historical figures
    - group: bands, collectives, organizations
    - artwork: songs, albums, films, books
    - event: historical or cultural events
    - place: cities, venues, landmarks
    - phrase: quotations, slogans, catchphrases
    - brand: companies, products, labels
- A reference may be implicit and only recognizable from context.
- Each description must be at least three sentences and explain how and where
  the entity is referenced in the lyrics.
- Do not mention the explanation or the annotation itself in descriptions.
- Answer with a JSON list inside a ```json fenced block.
- If there are no references, answer with an empty list.

[OUTPUT FORMAT]
List of
{
    "entity": name of the referenced entity,
    "type": one of "person", "group", "artwork", "event", "place", "phrase", "brand",
    "description": detailed explanation of the reference
}
"#;

const DEFAULT_FEWSHOT: &str = r#"
#############
[EXAMPLE]
#############
Target lyrics:
We once had things in common Now the only thing we share is the refrigerator Ice cold, baby, I told you, I'm ice cold (Ice cold!)

Human annotation:
The couple used to share hobbies and goals; now they only share fridge space. The line also nods to the OutKast interlude "Where Are My Panties" and their song "Hey Ya!".

Output:
```json
[
    {
        "entity": "OutKast",
        "type": "group",
        "description": "The shouted 'Ice cold!' echoes the call and response in OutKast's 'Hey Ya!'. The duo is referenced through the refrigerator imagery of the verse. André 3000 of OutKast later appears on the same album, which strengthens the nod."
    }
]
```
"#;

const DEFAULT_TASK: &str = r#"
#############
[REAL DATA]
#############
Target lyrics:
[TARGET LYRICS]

Human annotation:
[HUMAN ANNOTATION]

Output:
"#;

/// Template parts failed validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("task template is missing the {0} marker")]
    MissingMarker(&'static str),
}

/// Immutable prompt template, built once and shared by reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// `prefix + fewshot`, which never changes per annotation
    preamble: String,
    task: String,
}

/// A rendered prompt and the annotation source it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub source: String,
}

impl PromptTemplate {
    /// Build a template; `task` must contain both markers
    pub fn new(
        prefix: impl Into<String>,
        fewshot: impl Into<String>,
        task: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let task = task.into();
        if !task.contains(LYRICS_MARKER) {
            return Err(TemplateError::MissingMarker(LYRICS_MARKER));
        }
        if !task.contains(ANNOTATION_MARKER) {
            return Err(TemplateError::MissingMarker(ANNOTATION_MARKER));
        }

        let mut preamble = prefix.into();
        preamble.push_str(&fewshot.into());
        Ok(Self { preamble, task })
    }

    /// Built-in template with any configured parts swapped in
    pub fn from_config(config: &PromptConfig) -> Result<Self, TemplateError> {
        Self::new(
            config.prefix.as_deref().unwrap_or(DEFAULT_PREFIX),
            config.fewshot.as_deref().unwrap_or(DEFAULT_FEWSHOT),
            config.task.as_deref().unwrap_or(DEFAULT_TASK),
        )
    }

    /// Render the prompt for one annotation
    ///
    /// Pure: the same annotation always yields the same text.
    pub fn build_prompt(&self, annotation: &Annotation) -> Prompt {
        let task = self
            .task
            .replace(LYRICS_MARKER, &annotation.lyrics)
            .replace(ANNOTATION_MARKER, &annotation.annotation);

        let mut text = String::with_capacity(self.preamble.len() + task.len());
        text.push_str(&self.preamble);
        text.push_str(&task);

        Prompt {
            text,
            source: annotation.source.clone(),
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            preamble: format!("{}{}", DEFAULT_PREFIX, DEFAULT_FEWSHOT),
            task: DEFAULT_TASK.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(lyrics: &str, text: &str) -> Annotation {
        Annotation {
            lyrics: lyrics.to_string(),
            annotation: text.to_string(),
            source: "https://genius.com/123".to_string(),
        }
    }

    #[test]
    fn test_default_template_substitutes_both_markers() {
        let template = PromptTemplate::default();
        let prompt = template.build_prompt(&annotation("Ice cold", "An OutKast nod"));

        assert!(prompt.text.contains("Target lyrics:\nIce cold\n"));
        assert!(prompt.text.contains("Human annotation:\nAn OutKast nod\n"));
        assert!(!prompt.text.contains(LYRICS_MARKER));
        assert!(!prompt.text.contains(ANNOTATION_MARKER));
        assert_eq!(prompt.source, "https://genius.com/123");
    }

    #[test]
    fn test_build_prompt_is_deterministic() {
        let template = PromptTemplate::default();
        let a = annotation("Super rich kids", "Elton John reference");
        assert_eq!(template.build_prompt(&a), template.build_prompt(&a));
    }

    #[test]
    fn test_prompt_is_prefix_fewshot_task() {
        let template =
            PromptTemplate::new("P|", "F|", "L=[TARGET LYRICS];A=[HUMAN ANNOTATION]").unwrap();
        let prompt = template.build_prompt(&annotation("x", "y"));
        assert_eq!(prompt.text, "P|F|L=x;A=y");
    }

    #[test]
    fn test_unicode_passes_through_verbatim() {
        let template = PromptTemplate::new("", "", "[TARGET LYRICS]|[HUMAN ANNOTATION]").unwrap();
        let prompt = template.build_prompt(&annotation("Frank’s room — 40°F", "“It pours” \\n"));
        assert_eq!(prompt.text, "Frank’s room — 40°F|“It pours” \\n");
    }

    #[test]
    fn test_marker_inside_lyrics_is_substituted_in_second_pass() {
        let template = PromptTemplate::new("", "", "[TARGET LYRICS]|[HUMAN ANNOTATION]").unwrap();
        let prompt = template.build_prompt(&annotation("see [HUMAN ANNOTATION]", "note"));
        assert_eq!(prompt.text, "see note|note");
    }

    #[test]
    fn test_new_requires_markers() {
        assert_eq!(
            PromptTemplate::new("", "", "only [HUMAN ANNOTATION]"),
            Err(TemplateError::MissingMarker(LYRICS_MARKER))
        );
        assert_eq!(
            PromptTemplate::new("", "", "only [TARGET LYRICS]"),
            Err(TemplateError::MissingMarker(ANNOTATION_MARKER))
        );
    }

    #[test]
    fn test_from_config_overrides_parts() {
        let config = PromptConfig {
            prefix: Some("PREFIX\n".to_string()),
            fewshot: Some(String::new()),
            task: None,
        };
        let template = PromptTemplate::from_config(&config).unwrap();
        let prompt = template.build_prompt(&annotation("l", "a"));
        assert!(prompt.text.starts_with("PREFIX\n\n#############\n[REAL DATA]"));
    }

    #[test]
    fn test_from_default_config_matches_default() {
        let template = PromptTemplate::from_config(&PromptConfig::default()).unwrap();
        assert_eq!(template, PromptTemplate::default());
    }
}
