//! Review protocol run by the cheaper validator model.

use crate::config::DEFAULT_VALIDATION_MODEL;

pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/validation.md");

pub const MAX_TOKENS: u32 = 2000;
pub const TEMPERATURE: f64 = 0.3;

/// Score at or above which a study is approved.
pub const APPROVE_THRESHOLD: i64 = 75;
/// Score at or above which a study needs review rather than revision.
pub const REVIEW_THRESHOLD: i64 = 60;

/// Model id and sampling settings for a validation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_VALIDATION_MODEL.to_string(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

pub fn wrap_input(biblical_text: &str, reference: &str, study_content: &str) -> String {
    format!(
        "Biblical Reference: {reference}\n\nBiblical Text:\n{biblical_text}\n\n---\n\nGenerated Study:\n{study_content}\n\n---\n\nEvaluate this study. Be honest. Be direct. Celebrate what works. Flag what doesn't.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_input_orders_sections() {
        let wrapped = wrap_input("In the beginning", "Genesis 1:1", "# Study");
        let text_at = wrapped.find("Biblical Text:\nIn the beginning").unwrap();
        let study_at = wrapped.find("Generated Study:\n# Study").unwrap();
        assert!(wrapped.starts_with("Biblical Reference: Genesis 1:1"));
        assert!(text_at < study_at);
    }

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.model, DEFAULT_VALIDATION_MODEL);
    }
}
