//! Response extraction
//!
//! Pulls the first ```json fenced block out of a model reply (tag matched
//! case-insensitively), decodes it as a list of records and validates each
//! record independently. Text outside the fence is ignored.

use lyref_common::{validate_reference, ExtractedReference};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```json[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("JSON fence pattern is valid")
});

/// Reply did not carry a decodable reference list
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("No JSON block found in model reply")]
    MissingFence,

    #[error("JSON block could not be decoded: {0}")]
    InvalidJson(String),

    #[error("JSON block is not a list")]
    NotAList,
}

/// Body of the first fenced JSON block, if any
pub fn find_json_block(reply: &str) -> Option<&str> {
    JSON_FENCE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode and validate the references in one model reply
///
/// Records failing validation are logged and skipped; the result may be
/// empty or shorter than the decoded list.
pub fn extract(reply: &str) -> Result<Vec<ExtractedReference>, FormatError> {
    let block = find_json_block(reply).ok_or(FormatError::MissingFence)?;

    let decoded: Value =
        serde_json::from_str(block).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
    let records = match decoded {
        Value::Array(records) => records,
        _ => return Err(FormatError::NotAList),
    };

    let total = records.len();
    let mut references = Vec::with_capacity(total);
    for (index, record) in records.iter().enumerate() {
        match validate_reference(record) {
            Ok(reference) => references.push(reference),
            Err(e) => {
                warn!(record = index, error = %e, "Reference validation failed, skipping record");
            }
        }
    }

    debug!(
        accepted = references.len(),
        rejected = total - references.len(),
        "Extracted references from reply"
    );

    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyref_common::ReferenceType;

    #[test]
    fn test_extract_single_reference() {
        let reply = "Here you go:\n```json\n[{\"entity\":\"X\",\"type\":\"person\",\"description\":\"...\"}]\n```\nDone.";
        let references = extract(reply).unwrap();
        assert_eq!(
            references,
            vec![ExtractedReference {
                entity: "X".to_string(),
                kind: ReferenceType::Person,
                description: "...".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_fence_is_format_error() {
        assert_eq!(extract("No references here."), Err(FormatError::MissingFence));
        // A bare list without the fence is not accepted
        assert_eq!(extract("[]"), Err(FormatError::MissingFence));
        // Untagged fence
        assert_eq!(extract("```\n[]\n```"), Err(FormatError::MissingFence));
    }

    #[test]
    fn test_empty_list_is_not_a_failure() {
        assert_eq!(extract("```json\n[]\n```"), Ok(vec![]));
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        let reply = "```JSON\n[{\"entity\":\"Nike\",\"type\":\"brand\",\"description\":\"swoosh\"}]\n```";
        assert_eq!(extract(reply).unwrap()[0].kind, ReferenceType::Brand);
    }

    #[test]
    fn test_crlf_fence() {
        let reply = "```json\r\n[]\r\n```";
        assert_eq!(extract(reply), Ok(vec![]));
    }

    #[test]
    fn test_invalid_records_are_dropped_in_order() {
        let reply = r#"```json
[
    {"entity": "Wizard of Oz", "type": "artwork", "description": "tornado"},
    {"entity": "Someone", "type": "celebrity", "description": "bad tag"},
    {"entity": "", "type": "person", "description": "empty entity"},
    {"entity": "Katrina", "type": "event", "description": "hurricane"}
]
```"#;
        let names: Vec<_> = extract(reply)
            .unwrap()
            .into_iter()
            .map(|r| r.entity)
            .collect();
        assert_eq!(names, vec!["Wizard of Oz", "Katrina"]);
    }

    #[test]
    fn test_first_block_wins() {
        let reply = "```json\n[]\n```\nand also\n```json\n[{\"entity\":\"X\",\"type\":\"person\",\"description\":\"d\"}]\n```";
        assert_eq!(extract(reply), Ok(vec![]));
    }

    #[test]
    fn test_undecodable_block() {
        assert!(matches!(
            extract("```json\n[{\"entity\": \n```"),
            Err(FormatError::InvalidJson(_))
        ));
        assert_eq!(
            extract("```json\n{\"entity\":\"X\"}\n```"),
            Err(FormatError::NotAList)
        );
    }

    #[test]
    fn test_find_json_block_ignores_surrounding_text() {
        let reply = "Analysis...\n```json\n[1, 2]\n```\nThanks";
        assert_eq!(find_json_block(reply), Some("[1, 2]"));
    }
}
