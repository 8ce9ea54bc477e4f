//! Error types shared across the fetcher, engines and stores.
//!
//! Failures collapse into a handful of kinds: callers are expected to
//! surface them, not branch on transport details.

use thiserror::Error;

/// A scripture source could not be read.
///
/// Network failures, HTTP status errors, timeouts and missing page
/// containers all end up here with the upstream message attached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not fetch text: {message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A model call failed for a given reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Generation failed for {reference}: {message}")]
pub struct GenerationError {
    /// Reference the study was being generated for.
    pub reference: String,
    /// Original error message.
    pub message: String,
}

impl GenerationError {
    pub fn new(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// A preference value is unrecognized or out of range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreferencesError {
    #[error("Invalid study_length: {value}. Must be one of: short, medium, long")]
    StudyLength { value: String },

    #[error("Invalid tone_level: {value}. Must be between 0 and 8")]
    ToneLevel { value: String },

    #[error("Invalid language_complexity: {value}. Must be one of: accessible, standard, advanced")]
    LanguageComplexity { value: String },

    #[error("Invalid cultural_artifacts_level: {value}. Must be between 0 and 10")]
    CulturalArtifactsLevel { value: String },
}

/// Anything that can stop a study from being produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StudyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Invalid engine: {name}. Must be one of: threshold, palimpsest, collision")]
    UnknownEngine { name: String },

    #[error("{message}")]
    InvalidRequest { message: String },
}

/// Errors from the file and database stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid input: {message}")]
    Invalid { message: String },

    #[error(transparent)]
    Preferences(#[from] PreferencesError),

    #[error("Background task failed: {message}")]
    Task { message: String },
}

impl StorageError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
