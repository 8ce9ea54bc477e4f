//! Static protocol definitions: system prompt, input wrapper and output
//! constraints for each engine, plus the validator's review protocol.
//!
//! Protocols are immutable and shared by every request for an engine.

pub mod collision;
pub mod palimpsest;
pub mod threshold;
pub mod validation;

use serde::{Deserialize, Serialize};

use crate::preferences::StudyPreferences;

/// A study-generation methodology.
#[derive(Debug, Clone, Copy)]
pub struct Protocol {
    pub name: &'static str,
    pub system_prompt: &'static str,
    /// Token ceiling used when no preferences are supplied.
    pub default_max_tokens: u32,
    constraints: fn() -> OutputConstraints,
}

impl Protocol {
    pub const fn new(
        name: &'static str,
        system_prompt: &'static str,
        default_max_tokens: u32,
        constraints: fn() -> OutputConstraints,
    ) -> Self {
        Self {
            name,
            system_prompt,
            default_max_tokens,
            constraints,
        }
    }

    /// Fresh copy of the base output constraints.
    pub fn output_constraints(&self) -> OutputConstraints {
        (self.constraints)()
    }
}

/// Shape and length expectations for a generated study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConstraints {
    pub min_words: u32,
    pub max_words: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub tone: String,
    pub format: String,
    #[serde(default)]
    pub required_sections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_preferences: Option<StudyPreferences>,
}

impl OutputConstraints {
    pub(crate) fn markdown(min_words: u32, max_words: u32, tone: &str, sections: &[&str]) -> Self {
        Self {
            min_words,
            max_words,
            max_tokens: None,
            tone: tone.to_string(),
            format: "markdown".to_string(),
            required_sections: sections.iter().map(|s| s.to_string()).collect(),
            user_preferences: None,
        }
    }
}

/// Common wrapper for engines whose input is just the passage.
pub(crate) fn wrap_passage(engine_title: &str, text: &str, reference: &str) -> String {
    format!(
        "Biblical Reference: {reference}\n\nText:\n{text}\n\nGenerate a complete {engine_title} Engine study following the protocol above.\n"
    )
}
