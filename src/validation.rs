//! Typed review of a generated study.
//!
//! The validator model is asked for JSON, but nothing guarantees it. Parsing
//! never fails: a malformed reply becomes [`ValidationResult::failed`], and a
//! partially shaped reply degrades field by field to defaults.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*$").unwrap());

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Approve,
    #[default]
    Review,
    Revise,
}

impl Recommendation {
    /// Unknown values fall back to `Review`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "approve" => Self::Approve,
            "revise" => Self::Revise,
            _ => Self::Review,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Review => "review",
            Self::Revise => "revise",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagLevel {
    Critical,
    Important,
    #[default]
    Minor,
}

impl FlagLevel {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "important" => Self::Important,
            _ => Self::Minor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::Minor => "minor",
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyIssue {
    /// "error", "caution" or "note".
    pub severity: String,
    /// "linguistic", "historical", "citation", "intertextual" or "other".
    pub category: String,
    pub claim: String,
    pub concern: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheologicalNote {
    /// "speculation", "contested" or "boundary".
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub level: FlagLevel,
    pub message: String,
}

impl Flag {
    pub fn new(level: FlagLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyResult {
    pub score: i64,
    pub confidence: String,
    #[serde(default)]
    pub issues: Vec<AccuracyIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpfulnessResult {
    pub score: i64,
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Where the study pulls its punches.
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaithfulnessNote {
    /// "celebration", "concern" or "question".
    #[serde(rename = "type")]
    pub kind: String,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaithfulnessResult {
    pub score: i64,
    pub textual_honesty: String,
    pub prophetic_courage: String,
    #[serde(default)]
    pub notes: Vec<FaithfulnessNote>,
}

impl AccuracyResult {
    fn with_score(score: i64) -> Self {
        Self {
            score,
            confidence: "low".to_string(),
            issues: Vec::new(),
        }
    }
}

impl HelpfulnessResult {
    fn with_score(score: i64) -> Self {
        Self {
            score,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
        }
    }
}

impl FaithfulnessResult {
    fn with_score(score: i64) -> Self {
        Self {
            score,
            textual_honesty: "moderate".to_string(),
            prophetic_courage: "medium".to_string(),
            notes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Complete review of one generated study.
///
/// Stored as JSON alongside the study and deserialized back directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub overall_score: i64,
    pub recommendation: Recommendation,
    pub vibe: String,
    pub accuracy: AccuracyResult,
    pub helpfulness: HelpfulnessResult,
    pub faithfulness: FaithfulnessResult,
    #[serde(default)]
    pub flags: Vec<Flag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub theological_notes: Vec<TheologicalNote>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(default)]
    pub validation_error: Option<String>,
}

impl ValidationResult {
    /// Parse the validator's reply. Never fails.
    ///
    /// Surrounding markdown code fences are tolerated.
    pub fn from_json(text: &str) -> Self {
        let body = match CODE_FENCE.captures(text) {
            Some(caps) => caps.get(1).map_or(text, |m| m.as_str()),
            None => text,
        };

        let data: Value = match serde_json::from_str(body.trim()) {
            Ok(v) => v,
            Err(e) => return Self::failed(format!("Invalid JSON response: {}", e)),
        };
        let Some(obj) = data.as_object() else {
            return Self::failed("Invalid JSON response: expected an object");
        };

        let empty = Map::new();
        let section = |key: &str| obj.get(key).and_then(Value::as_object).unwrap_or(&empty);

        let acc = section("accuracy");
        let accuracy = AccuracyResult {
            score: score_of(acc, "score"),
            confidence: str_or(acc, "confidence", "low"),
            issues: objects(acc, "issues")
                .map(|issue| AccuracyIssue {
                    severity: str_or(issue, "severity", "note"),
                    category: str_or(issue, "category", "other"),
                    claim: str_or(issue, "claim", ""),
                    concern: str_or(issue, "concern", ""),
                    suggestion: str_or(issue, "suggestion", ""),
                })
                .collect(),
        };

        let help = section("helpfulness");
        let helpfulness = HelpfulnessResult {
            score: score_of(help, "score"),
            strengths: strings(help, "strengths"),
            weaknesses: strings(help, "weaknesses"),
        };

        let faith = section("faithfulness");
        let faithfulness = FaithfulnessResult {
            score: score_of(faith, "score"),
            textual_honesty: str_or(faith, "textual_honesty", "moderate"),
            prophetic_courage: str_or(faith, "prophetic_courage", "medium"),
            notes: objects(faith, "notes")
                .map(|note| FaithfulnessNote {
                    kind: str_or(note, "type", "note"),
                    observation: str_or(note, "observation", ""),
                })
                .collect(),
        };

        let flags = objects(obj, "flags")
            .map(|flag| Flag {
                level: FlagLevel::parse_lenient(&str_or(flag, "level", "minor")),
                message: str_or(flag, "message", ""),
            })
            .collect();

        let theological_notes = objects(obj, "theological_notes")
            .map(|note| TheologicalNote {
                kind: str_or(note, "type", "speculation"),
                location: str_or(note, "location", ""),
                note: str_or(note, "note", ""),
            })
            .collect();

        Self {
            overall_score: score_of(obj, "overall_score"),
            recommendation: Recommendation::parse_lenient(&str_or(obj, "recommendation", "review")),
            vibe: str_or(obj, "vibe", ""),
            accuracy,
            helpfulness,
            faithfulness,
            flags,
            theological_notes,
            summary: str_or(obj, "summary", "Validation completed"),
            raw_response: Some(data.clone()),
            validation_error: None,
        }
    }

    /// Sentinel for a review that could not be completed.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            overall_score: 0,
            recommendation: Recommendation::Review,
            vibe: "Validation failed".to_string(),
            accuracy: AccuracyResult::with_score(0),
            helpfulness: HelpfulnessResult::with_score(0),
            faithfulness: FaithfulnessResult::with_score(0),
            flags: vec![Flag::new(
                FlagLevel::Important,
                "Validation could not be completed",
            )],
            theological_notes: Vec::new(),
            summary: message.clone(),
            raw_response: None,
            validation_error: Some(message),
        }
    }

    /// Sentinel for a review that was intentionally not run.
    pub fn skipped() -> Self {
        Self {
            overall_score: 100,
            recommendation: Recommendation::Approve,
            vibe: "Unvalidated".to_string(),
            accuracy: AccuracyResult::with_score(100),
            helpfulness: HelpfulnessResult::with_score(100),
            faithfulness: FaithfulnessResult::with_score(100),
            flags: Vec::new(),
            theological_notes: Vec::new(),
            summary: "Validation skipped".to_string(),
            raw_response: None,
            validation_error: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.recommendation == Recommendation::Approve
    }

    pub fn needs_review(&self) -> bool {
        matches!(
            self.recommendation,
            Recommendation::Review | Recommendation::Revise
        )
    }

    pub fn has_critical_issues(&self) -> bool {
        self.flags.iter().any(|f| f.level == FlagLevel::Critical)
    }

    /// Flags ordered most severe first, for display.
    pub fn display_flags(&self) -> Vec<&Flag> {
        let mut flags: Vec<&Flag> = self.flags.iter().collect();
        flags.sort_by_key(|f| match f.level {
            FlagLevel::Critical => 0,
            FlagLevel::Important => 1,
            FlagLevel::Minor => 2,
        });
        flags
    }

    /// "green" at 80+, "yellow" at 60+, otherwise "red".
    pub fn score_color(&self) -> &'static str {
        if self.overall_score >= 80 {
            "green"
        } else if self.overall_score >= 60 {
            "yellow"
        } else {
            "red"
        }
    }

    /// JSON for storage, without the raw validator reply.
    pub fn to_storage_value(&self) -> Value {
        let mut stored = self.clone();
        stored.raw_response = None;
        serde_json::to_value(stored).unwrap_or(Value::Null)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let critical = self
            .flags
            .iter()
            .filter(|fl| fl.level == FlagLevel::Critical)
            .count();
        write!(
            f,
            "score={}, recommendation={}, flags={} ({} critical)",
            self.overall_score,
            self.recommendation,
            self.flags.len(),
            critical
        )
    }
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn str_or(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Integer score clamped to 0..=100; missing or non-numeric is 0.
fn score_of(obj: &Map<String, Value>, key: &str) -> i64 {
    let raw = match obj.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    raw.clamp(0, 100)
}

fn strings(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn objects<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_response() -> Value {
        json!({
            "overall_score": 82,
            "recommendation": "approve",
            "vibe": "Prophetic fire with a pastor's hands",
            "accuracy": {
                "score": 78,
                "confidence": "medium",
                "issues": [{
                    "severity": "caution",
                    "category": "linguistic",
                    "claim": "agape always means divine love",
                    "concern": "overstated lexical claim",
                    "suggestion": "soften to 'often'"
                }]
            },
            "helpfulness": {
                "score": 90,
                "strengths": ["concrete practices"],
                "weaknesses": ["tech section is thin"]
            },
            "faithfulness": {
                "score": 85,
                "textual_honesty": "good",
                "prophetic_courage": "high",
                "notes": [{"type": "celebration", "observation": "stays with the hard verse"}]
            },
            "flags": [
                {"level": "minor", "message": "one citation unverified"},
                {"level": "critical", "message": "misattributed quote"}
            ],
            "summary": "Strong study. Verify the quote."
        })
    }

    #[test]
    fn test_from_json_reproduces_fields() {
        let raw = full_response();
        let result = ValidationResult::from_json(&raw.to_string());

        assert_eq!(result.overall_score, 82);
        assert_eq!(result.recommendation, Recommendation::Approve);
        assert_eq!(result.vibe, "Prophetic fire with a pastor's hands");
        assert_eq!(result.accuracy.score, 78);
        assert_eq!(result.accuracy.confidence, "medium");
        assert_eq!(result.accuracy.issues.len(), 1);
        assert_eq!(result.accuracy.issues[0].severity, "caution");
        assert_eq!(result.accuracy.issues[0].suggestion, "soften to 'often'");
        assert_eq!(result.helpfulness.strengths, vec!["concrete practices"]);
        assert_eq!(result.helpfulness.weaknesses, vec!["tech section is thin"]);
        assert_eq!(result.faithfulness.textual_honesty, "good");
        assert_eq!(result.faithfulness.prophetic_courage, "high");
        assert_eq!(result.faithfulness.notes[0].kind, "celebration");
        assert_eq!(result.flags.len(), 2);
        assert_eq!(result.summary, "Strong study. Verify the quote.");
        assert_eq!(result.validation_error, None);
        assert_eq!(result.raw_response, Some(raw.clone()));

        // Serializing back yields the same document apart from bookkeeping fields.
        let mut back = result.to_storage_value();
        back.as_object_mut().unwrap().remove("validation_error");
        assert_eq!(back, raw);
    }

    #[test]
    fn test_invalid_json_becomes_failed() {
        let result = ValidationResult::from_json("{not json");
        assert!(result.validation_error.is_some());
        assert_eq!(result.recommendation, Recommendation::Review);
        assert_eq!(result.overall_score, 0);
        assert!(result.needs_review());
    }

    #[test]
    fn test_non_object_json_becomes_failed() {
        let result = ValidationResult::from_json("[1, 2, 3]");
        assert!(result.validation_error.is_some());
    }

    #[test]
    fn test_partial_response_uses_defaults() {
        let result = ValidationResult::from_json(r#"{"overall_score": 64, "flags": [{}]}"#);
        assert_eq!(result.overall_score, 64);
        assert_eq!(result.recommendation, Recommendation::Review);
        assert_eq!(result.vibe, "");
        assert_eq!(result.accuracy.confidence, "low");
        assert_eq!(result.faithfulness.textual_honesty, "moderate");
        assert_eq!(result.faithfulness.prophetic_courage, "medium");
        assert_eq!(result.flags, vec![Flag::new(FlagLevel::Minor, "")]);
        assert_eq!(result.summary, "Validation completed");
        assert_eq!(result.validation_error, None);
    }

    #[test]
    fn test_code_fenced_response() {
        let fenced = format!("```json\n{}\n```", full_response());
        let result = ValidationResult::from_json(&fenced);
        assert_eq!(result.validation_error, None);
        assert_eq!(result.overall_score, 82);
    }

    #[test]
    fn test_unknown_recommendation_is_review() {
        let result = ValidationResult::from_json(r#"{"recommendation": "publish"}"#);
        assert_eq!(result.recommendation, Recommendation::Review);
    }

    #[test]
    fn test_scores_are_clamped() {
        let result = ValidationResult::from_json(r#"{"overall_score": 140.4}"#);
        assert_eq!(result.overall_score, 100);
    }

    #[test]
    fn test_skipped_sentinel() {
        let result = ValidationResult::skipped();
        assert_eq!(result.validation_error, None);
        assert!(result.is_approved());
        assert!(!result.needs_review());
        assert_eq!(result.overall_score, 100);
        assert!(result.flags.is_empty());
    }

    #[test]
    fn test_failed_sentinel() {
        let result = ValidationResult::failed("x");
        assert!(!result.is_approved());
        assert!(result.needs_review());
        assert_eq!(result.validation_error.as_deref(), Some("x"));
        assert_eq!(result.summary, "x");
        assert_eq!(result.flags[0].level, FlagLevel::Important);
        assert!(!result.has_critical_issues());
    }

    #[test]
    fn test_critical_flags_and_display_order() {
        let result = ValidationResult::from_json(&full_response().to_string());
        assert!(result.has_critical_issues());
        let shown = result.display_flags();
        assert_eq!(shown[0].level, FlagLevel::Critical);
        assert_eq!(shown[1].level, FlagLevel::Minor);
    }

    #[test]
    fn test_score_color_bands() {
        let mut result = ValidationResult::skipped();
        for (score, color) in [(80, "green"), (79, "yellow"), (60, "yellow"), (59, "red")] {
            result.overall_score = score;
            assert_eq!(result.score_color(), color);
        }
    }

    #[test]
    fn test_stored_json_deserializes_directly() {
        let result = ValidationResult::from_json(&full_response().to_string());
        let stored = result.to_storage_value().to_string();
        let back: ValidationResult = serde_json::from_str(&stored).unwrap();
        assert_eq!(back.overall_score, result.overall_score);
        assert_eq!(back.flags, result.flags);
        assert_eq!(back.raw_response, None);
    }
}
