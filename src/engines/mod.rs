//! Interpretation engines.
//!
//! An engine picks its protocol, optionally compiles preferences into it,
//! makes one model call and packages the reply with metadata. Engines hold
//! no state beyond the shared model client.

pub mod collision;
pub mod palimpsest;
pub mod threshold;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::llms::{streaming, ModelClient};
use crate::preferences::StudyPreferences;
use crate::protocol_builder;
use crate::protocols::collision::CollisionVectors;
use crate::protocols::{OutputConstraints, Protocol};
use crate::utilities::errors::{GenerationError, StudyError};
use crate::utilities::string_utils::word_count;

pub use collision::CollisionEngine;
pub use palimpsest::PalimpsestEngine;
pub use threshold::ThresholdEngine;

// ---------------------------------------------------------------------------
// EngineKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Threshold,
    Palimpsest,
    Collision,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [Self::Threshold, Self::Palimpsest, Self::Collision];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Palimpsest => "palimpsest",
            Self::Collision => "collision",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Threshold => "Four progressive thresholds, 2500-3500 words",
            Self::Palimpsest => "Five PaRDeS layers, 3000-4000 words",
            Self::Collision => "Randomized collision vectors, 3000-5000 words",
        }
    }
}

impl FromStr for EngineKind {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StudyError::UnknownEngine { name: s.to_string() })
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Whitespace-separated word count of the content.
    pub word_count: usize,
    /// Generation time, RFC 3339 in local time.
    pub timestamp: String,
    pub constraints: OutputConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collision_vectors: Option<CollisionVectors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<StudyPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// A generated study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyResult {
    pub engine: EngineKind,
    pub reference: String,
    pub content: String,
    pub metadata: StudyMetadata,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Caller-controlled knobs for one generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// When set, the prompt and token ceiling are compiled from these.
    pub preferences: Option<StudyPreferences>,
    /// Collision only: pin any category whose options contain this value.
    pub collision_vector: Option<String>,
    /// Collision only: use these vectors instead of drawing.
    pub custom_vectors: Option<CollisionVectors>,
}

impl GenerationOptions {
    pub fn with_preferences(preferences: StudyPreferences) -> Self {
        Self {
            preferences: Some(preferences),
            ..Default::default()
        }
    }
}

/// A compiled model call plus the metadata it will be packaged with.
#[derive(Debug, Clone)]
pub struct PreparedStudy {
    pub user_message: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub constraints: OutputConstraints,
    pub preferences: Option<StudyPreferences>,
    pub collision_vectors: Option<CollisionVectors>,
}

impl PreparedStudy {
    /// Compile `protocol` for `user_message`, honoring preferences if given.
    pub fn compile(
        protocol: &Protocol,
        user_message: String,
        preferences: Option<&StudyPreferences>,
    ) -> Result<Self, StudyError> {
        let base = protocol.output_constraints();
        let prepared = match preferences {
            Some(prefs) => Self {
                user_message,
                system_prompt: protocol_builder::build_system_prompt(protocol.system_prompt, prefs)?,
                max_tokens: prefs.length_constraints().max_tokens,
                constraints: protocol_builder::build_output_constraints(&base, prefs),
                preferences: Some(prefs.clone()),
                collision_vectors: None,
            },
            None => Self {
                user_message,
                system_prompt: protocol.system_prompt.to_string(),
                max_tokens: protocol.default_max_tokens,
                constraints: base,
                preferences: None,
                collision_vectors: None,
            },
        };
        Ok(prepared)
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn protocol(&self) -> Protocol;

    fn client(&self) -> &dyn ModelClient;

    /// Build the model call for `text`. No network access.
    fn prepare(
        &self,
        text: &str,
        reference: &str,
        options: &GenerationOptions,
    ) -> Result<PreparedStudy, StudyError>;

    /// Engine-specific metadata.
    fn decorate(&self, _metadata: &mut StudyMetadata) {}

    /// Plain generation with the protocol's fixed prompt and token ceiling.
    async fn generate(&self, text: &str, reference: &str) -> Result<StudyResult, StudyError> {
        self.generate_with_options(text, reference, &GenerationOptions::default())
            .await
    }

    /// Generation with compiled preferences; defaults when `None`.
    async fn generate_with_preferences(
        &self,
        text: &str,
        reference: &str,
        preferences: Option<&StudyPreferences>,
    ) -> Result<StudyResult, StudyError> {
        let options = GenerationOptions::with_preferences(preferences.cloned().unwrap_or_default());
        self.generate_with_options(text, reference, &options).await
    }

    async fn generate_with_options(
        &self,
        text: &str,
        reference: &str,
        options: &GenerationOptions,
    ) -> Result<StudyResult, StudyError> {
        let prepared = self.prepare(text, reference, options)?;
        log::info!("Generating {} study for {}", self.name(), reference);
        let content = self
            .client()
            .generate_study(
                &prepared.user_message,
                reference,
                &prepared.system_prompt,
                prepared.max_tokens,
            )
            .await?;
        Ok(self.package(reference, content, prepared))
    }

    /// Streamed generation; `on_delta` sees text as it arrives and the
    /// packaged result carries the reassembled study.
    async fn generate_streaming(
        &self,
        text: &str,
        reference: &str,
        options: &GenerationOptions,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> Result<StudyResult, StudyError> {
        let prepared = self.prepare(text, reference, options)?;
        let receiver = self
            .client()
            .generate_study_streaming(
                &prepared.user_message,
                reference,
                &prepared.system_prompt,
                prepared.max_tokens,
            )
            .await?;
        let content = streaming::drain(receiver, on_delta)
            .await
            .map_err(|message| GenerationError::new(reference, message))?;
        Ok(self.package(reference, content, prepared))
    }

    fn package(&self, reference: &str, content: String, prepared: PreparedStudy) -> StudyResult {
        let mut metadata = StudyMetadata {
            word_count: word_count(&content),
            timestamp: Local::now().to_rfc3339(),
            constraints: prepared.constraints,
            layers: None,
            steps: None,
            collision_vectors: prepared.collision_vectors,
            preferences: prepared.preferences,
            source: None,
            translation: None,
        };
        self.decorate(&mut metadata);
        StudyResult {
            engine: self.kind(),
            reference: reference.to_string(),
            content,
            metadata,
        }
    }
}

/// Construct the engine for `kind` over a shared client.
pub fn build_engine(kind: EngineKind, client: Arc<dyn ModelClient>) -> Arc<dyn Engine> {
    match kind {
        EngineKind::Threshold => Arc::new(ThresholdEngine::new(client)),
        EngineKind::Palimpsest => Arc::new(PalimpsestEngine::new(client)),
        EngineKind::Collision => Arc::new(CollisionEngine::new(client)),
    }
}
