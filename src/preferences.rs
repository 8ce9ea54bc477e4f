//! User preferences that shape how a study is written.
//!
//! A [`StudyPreferences`] bundle is compiled into the system prompt by
//! [`crate::protocol_builder`]. Enum fields are checked when parsed; the two
//! numeric levels are checked by [`StudyPreferences::validate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utilities::errors::PreferencesError;
use crate::utilities::string_utils::truncate_chars;

pub const TONE_LEVEL_MAX: i32 = 8;
pub const CULTURAL_ARTIFACTS_LEVEL_MAX: i32 = 10;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StudyLength {
    pub const ALL: [StudyLength; 3] = [Self::Short, Self::Medium, Self::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Fixed word and token bounds for this length.
    pub fn constraints(&self) -> LengthConstraints {
        match self {
            Self::Short => LengthConstraints::new(1000, 1500, 4000),
            Self::Medium => LengthConstraints::new(2500, 3500, 8000),
            Self::Long => LengthConstraints::new(5000, 7000, 16000),
        }
    }
}

impl FromStr for StudyLength {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(PreferencesError::StudyLength {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StudyLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageComplexity {
    Accessible,
    #[default]
    Standard,
    Advanced,
}

impl LanguageComplexity {
    pub const ALL: [LanguageComplexity; 3] = [Self::Accessible, Self::Standard, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accessible => "accessible",
            Self::Standard => "standard",
            Self::Advanced => "advanced",
        }
    }
}

impl FromStr for LanguageComplexity {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accessible" => Ok(Self::Accessible),
            "standard" => Ok(Self::Standard),
            "advanced" => Ok(Self::Advanced),
            other => Err(PreferencesError::LanguageComplexity {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for LanguageComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse tone band derived from `tone_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneCategory {
    Academic,
    Balanced,
    Devotional,
}

impl ToneCategory {
    pub fn from_level(level: i32) -> Self {
        if level <= 2 {
            Self::Academic
        } else if level <= 5 {
            Self::Balanced
        } else {
            Self::Devotional
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Balanced => "balanced",
            Self::Devotional => "devotional",
        }
    }
}

impl fmt::Display for ToneCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Word and token bounds for one study length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthConstraints {
    pub min_words: u32,
    pub max_words: u32,
    pub max_tokens: u32,
}

impl LengthConstraints {
    const fn new(min_words: u32, max_words: u32, max_tokens: u32) -> Self {
        Self {
            min_words,
            max_words,
            max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// StudyPreferences
// ---------------------------------------------------------------------------

/// Preferences for a single study generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPreferences {
    #[serde(default)]
    pub study_length: StudyLength,
    /// 0 (academic) through 8 (devotional).
    #[serde(default = "default_tone_level")]
    pub tone_level: i32,
    #[serde(default)]
    pub language_complexity: LanguageComplexity,
    #[serde(default)]
    pub focus_areas: Option<String>,
    /// 0 disables contemporary cultural references; 10 is densest.
    #[serde(default)]
    pub cultural_artifacts_level: i32,
}

fn default_tone_level() -> i32 {
    5
}

impl Default for StudyPreferences {
    fn default() -> Self {
        Self {
            study_length: StudyLength::Medium,
            tone_level: default_tone_level(),
            language_complexity: LanguageComplexity::Standard,
            focus_areas: None,
            cultural_artifacts_level: 0,
        }
    }
}

impl StudyPreferences {
    /// Check the numeric ranges.
    pub fn validate(&self) -> Result<(), PreferencesError> {
        if !(0..=TONE_LEVEL_MAX).contains(&self.tone_level) {
            return Err(PreferencesError::ToneLevel {
                value: self.tone_level.to_string(),
            });
        }
        if !(0..=CULTURAL_ARTIFACTS_LEVEL_MAX).contains(&self.cultural_artifacts_level) {
            return Err(PreferencesError::CulturalArtifactsLevel {
                value: self.cultural_artifacts_level.to_string(),
            });
        }
        Ok(())
    }

    pub fn tone_category(&self) -> ToneCategory {
        ToneCategory::from_level(self.tone_level)
    }

    pub fn length_constraints(&self) -> LengthConstraints {
        self.study_length.constraints()
    }

    /// Focus areas, treating blank strings as unset.
    pub fn focus(&self) -> Option<&str> {
        self.focus_areas
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Build from a loosely shaped JSON object.
    ///
    /// Missing keys take defaults. Unknown enum strings and non-integer
    /// levels are rejected; range checks happen in [`Self::validate`],
    /// which this calls before returning.
    pub fn from_value(value: &Value) -> Result<Self, PreferencesError> {
        let defaults = Self::default();
        Self::overlay(defaults, value)
    }

    /// Apply any preference keys present in `value` on top of `base`.
    pub fn overlay(base: Self, value: &Value) -> Result<Self, PreferencesError> {
        let mut prefs = base;

        if let Some(raw) = value.get("study_length").filter(|v| !v.is_null()) {
            prefs.study_length = match raw.as_str() {
                Some(s) => s.parse()?,
                None => {
                    return Err(PreferencesError::StudyLength {
                        value: raw.to_string(),
                    })
                }
            };
        }
        if let Some(raw) = value.get("tone_level").filter(|v| !v.is_null()) {
            prefs.tone_level = level_from_value(raw).ok_or_else(|| PreferencesError::ToneLevel {
                value: raw.to_string(),
            })?;
        }
        if let Some(raw) = value.get("language_complexity").filter(|v| !v.is_null()) {
            prefs.language_complexity = match raw.as_str() {
                Some(s) => s.parse()?,
                None => {
                    return Err(PreferencesError::LanguageComplexity {
                        value: raw.to_string(),
                    })
                }
            };
        }
        if let Some(raw) = value.get("focus_areas") {
            prefs.focus_areas = raw
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
        if let Some(raw) = value.get("cultural_artifacts_level").filter(|v| !v.is_null()) {
            prefs.cultural_artifacts_level =
                level_from_value(raw).ok_or_else(|| PreferencesError::CulturalArtifactsLevel {
                    value: raw.to_string(),
                })?;
        }

        prefs.validate()?;
        Ok(prefs)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Integers, integral floats and numeric strings (form posts) are accepted.
fn level_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|i| i32::try_from(i).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for StudyPreferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let focus = self
            .focus()
            .map(|s| truncate_chars(s, 30))
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "length={}, tone={}({}), language={}, focus='{}'",
            self.study_length,
            self.tone_category(),
            self.tone_level,
            self.language_complexity,
            focus
        )
    }
}
