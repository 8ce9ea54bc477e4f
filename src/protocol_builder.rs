//! Compiles a base protocol plus [`StudyPreferences`] into a model-ready
//! system prompt and adjusted output constraints.
//!
//! The customization block is spliced in front of the first `##` heading
//! of the base prompt, so the engine's opening description stays on top
//! and the methodology follows. Prompts without a heading get the block
//! prepended.

use crate::preferences::{LanguageComplexity, StudyLength, StudyPreferences, ToneCategory};
use crate::protocols::OutputConstraints;
use crate::utilities::errors::PreferencesError;

pub const CUSTOMIZATION_HEADING: &str = "## USER CUSTOMIZATION";

// ---------------------------------------------------------------------------
// Instruction tables
// ---------------------------------------------------------------------------

fn length_block(length: StudyLength) -> String {
    let (words, guidance) = match length {
        StudyLength::Short => (
            "1000-1500 words",
            "Be concise and stay with the core insight. Skip extended examples.",
        ),
        StudyLength::Medium => (
            "2500-3500 words",
            "Balanced depth with a few developed examples. Explore fully without padding.",
        ),
        StudyLength::Long => (
            "5000-7000 words",
            "Maximum depth. Several perspectives, extended examples, thorough exploration.",
        ),
    };
    format!("**LENGTH**: Target {}\n{}", words, guidance)
}

fn tone_block(category: ToneCategory, level: i32) -> String {
    let (title, guidance) = match category {
        ToneCategory::Academic => (
            "Academic",
            "Scholarly and analytical. Use technical terms where they help and situate claims in historical context and theological tradition.",
        ),
        ToneCategory::Balanced => (
            "Balanced",
            "Blend scholarly insight with personal reflection. Introduce theological vocabulary with brief explanations.",
        ),
        ToneCategory::Devotional => (
            "Devotional",
            "Warm and personal, oriented to spiritual formation. Speak to the heart while honoring the mind.",
        ),
    };
    format!("**TONE**: {} (level {}/8)\n{}", title, level, guidance)
}

fn language_block(complexity: LanguageComplexity) -> String {
    let (title, guidance) = match complexity {
        LanguageComplexity::Accessible => (
            "Accessible",
            "Plain language for high-school readers. Define every technical or theological term.",
        ),
        LanguageComplexity::Standard => (
            "Standard",
            "College-level vocabulary. Briefly define specialized terms where helpful.",
        ),
        LanguageComplexity::Advanced => (
            "Advanced",
            "Assume graduate-level biblical studies. Engage scholarly debate and textual criticism without extended explanation.",
        ),
    };
    format!("**LANGUAGE**: {}\n{}", title, guidance)
}

fn focus_block(focus: &str) -> String {
    format!(
        "**FOCUS AREAS**: The user is particularly interested in themes related to: \"{}\"\n\n\
         Pay special attention to how the text speaks to these interests, including connections that are not immediately obvious.",
        focus
    )
}

/// Density band for a cultural-artifacts level (1..=10).
pub fn artifact_density(level: i32) -> (&'static str, &'static str) {
    if level <= 3 {
        ("occasional", "2-4")
    } else if level <= 6 {
        ("moderate", "5-8")
    } else {
        ("rich", "10+")
    }
}

fn cultural_artifacts_block(level: i32) -> String {
    let (density, count) = artifact_density(level);
    format!(
        "**CULTURAL ARTIFACTS**: Level {}/10 ({} density)\n\
         Include {} specific cultural references woven through the study: news, music, film and television, books, podcasts, online culture, interviews, visual art.\n\
         Name concrete works and quotes. Keep them inside the flow of the study rather than in a separate section, and let them illuminate the text rather than distract from it.",
        level, density, count
    )
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Ordered customization blocks for `prefs`.
pub fn customization_parts(prefs: &StudyPreferences) -> Vec<String> {
    let mut parts = vec![
        length_block(prefs.study_length),
        tone_block(prefs.tone_category(), prefs.tone_level),
        language_block(prefs.language_complexity),
    ];
    if let Some(focus) = prefs.focus() {
        parts.push(focus_block(focus));
    }
    if prefs.cultural_artifacts_level > 0 {
        parts.push(cultural_artifacts_block(prefs.cultural_artifacts_level));
    }
    parts
}

fn injection_block(parts: &[String]) -> String {
    format!(
        "\n{}\n\nThe user has requested the following customizations for this study:\n\n{}\n\n\
         **CRITICAL**: Honor these preferences while keeping this engine's core methodology. The structure stays the same; the preferences shape how the insights are expressed.\n\n---\n",
        CUSTOMIZATION_HEADING,
        parts.join("\n")
    )
}

/// Splice the customization block for `prefs` into `base_prompt`.
pub fn build_system_prompt(
    base_prompt: &str,
    prefs: &StudyPreferences,
) -> Result<String, PreferencesError> {
    prefs.validate()?;
    let injection = injection_block(&customization_parts(prefs));

    match base_prompt.find("##") {
        Some(at) => {
            let (intro, rest) = base_prompt.split_at(at);
            Ok(format!("{}{}{}", intro, injection, rest))
        }
        None => {
            log::debug!("Base prompt has no section heading; prepending customization");
            Ok(format!("{}{}", injection, base_prompt))
        }
    }
}

/// Overlay length-derived bounds on `base` and record the preferences.
pub fn build_output_constraints(
    base: &OutputConstraints,
    prefs: &StudyPreferences,
) -> OutputConstraints {
    let length = prefs.length_constraints();
    OutputConstraints {
        min_words: length.min_words,
        max_words: length.max_words,
        max_tokens: Some(length.max_tokens),
        user_preferences: Some(prefs.clone()),
        ..base.clone()
    }
}
