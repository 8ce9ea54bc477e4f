//! The generation pipeline shared by the CLI and the server.
//!
//! [`StudyGeneratorService`] is built once at startup and handed to
//! whatever needs it; it owns the model client, the fetcher and one engine
//! per kind.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engines::{build_engine, Engine, EngineKind, GenerationOptions, StudyResult};
use crate::llms::{ClaudeClient, ModelClient};
use crate::text_fetcher::{MoravianText, ReadingType, TextFetcher, Translation};
use crate::utilities::errors::{FetchError, StudyError};
use crate::validation::ValidationResult;

/// Where the passage text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    #[default]
    Paste,
    Run,
    Moravian,
    Rcl,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paste => "paste",
            Self::Run => "run",
            Self::Moravian => "moravian",
            Self::Rcl => "rcl",
        }
    }
}

impl FromStr for TextSource {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paste" => Ok(Self::Paste),
            "run" => Ok(Self::Run),
            "moravian" => Ok(Self::Moravian),
            "rcl" => Ok(Self::Rcl),
            other => Err(StudyError::InvalidRequest {
                message: format!(
                    "Invalid source: {}. Must be one of: paste, run, moravian, rcl",
                    other
                ),
            }),
        }
    }
}

impl fmt::Display for TextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct StudyRequest {
    pub engine: EngineKind,
    pub source: TextSource,
    /// Required for `paste` and `run`; derived for `moravian` and `rcl`.
    pub reference: Option<String>,
    /// Required for `paste`; fetched otherwise.
    pub text: Option<String>,
    pub translation: Option<Translation>,
    /// RCL only.
    pub reading: ReadingType,
    pub options: GenerationOptions,
}

/// Passage text resolved for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    pub reference: String,
    pub text: String,
    pub translation: Translation,
}

/// A study plus the passage it was generated from.
#[derive(Debug, Clone)]
pub struct GeneratedStudy {
    pub study: StudyResult,
    pub biblical_text: String,
    pub translation: Translation,
    pub source: TextSource,
}

// ---------------------------------------------------------------------------
// StudyGeneratorService
// ---------------------------------------------------------------------------

pub struct StudyGeneratorService {
    client: Arc<dyn ModelClient>,
    fetcher: TextFetcher,
    engines: HashMap<EngineKind, Arc<dyn Engine>>,
    validation_enabled: bool,
}

impl StudyGeneratorService {
    pub fn new(client: Arc<dyn ModelClient>, fetcher: TextFetcher, validation_enabled: bool) -> Self {
        let engines = EngineKind::ALL
            .into_iter()
            .map(|kind| (kind, build_engine(kind, Arc::clone(&client))))
            .collect();
        Self {
            client,
            fetcher,
            engines,
            validation_enabled,
        }
    }

    /// Production wiring: Anthropic client and live web scraping.
    pub fn from_config(config: &Config) -> Self {
        let translation = config.default_translation.parse().unwrap_or_else(|e: FetchError| {
            log::warn!("{}; falling back to {}", e, Translation::default());
            Translation::default()
        });
        Self::new(
            Arc::new(ClaudeClient::from_config(config)),
            TextFetcher::new(translation),
            config.enable_validation,
        )
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn default_translation(&self) -> Translation {
        self.fetcher.default_translation()
    }

    pub fn engine(&self, kind: EngineKind) -> Result<Arc<dyn Engine>, StudyError> {
        self.engines
            .get(&kind)
            .cloned()
            .ok_or_else(|| StudyError::UnknownEngine {
                name: kind.to_string(),
            })
    }

    pub fn list_engines(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .into_iter()
            .filter(|k| self.engines.contains_key(k))
            .collect()
    }

    pub fn list_translations(&self) -> Vec<(Translation, &'static str)> {
        TextFetcher::list_translations()
    }

    // -- Text ---------------------------------------------------------------

    pub async fn fetch_text(
        &self,
        reference: &str,
        translation: Option<Translation>,
    ) -> Result<String, FetchError> {
        self.fetcher.fetch(reference, translation).await
    }

    pub async fn fetch_moravian(
        &self,
        translation: Option<Translation>,
    ) -> Result<MoravianText, FetchError> {
        match translation {
            Some(t) => self.fetcher.with_translation(t).fetch_moravian().await,
            None => self.fetcher.fetch_moravian().await,
        }
    }

    pub async fn fetch_rcl(
        &self,
        reading: ReadingType,
        translation: Option<Translation>,
    ) -> Result<(String, String), FetchError> {
        match translation {
            Some(t) => self.fetcher.with_translation(t).fetch_rcl(reading).await,
            None => self.fetcher.fetch_rcl(reading).await,
        }
    }

    /// Produce the reference and passage text a request should be run on.
    pub async fn resolve_text(&self, request: &StudyRequest) -> Result<ResolvedText, StudyError> {
        let translation = request.translation.unwrap_or(self.default_translation());
        let reference = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let (reference, text) = match request.source {
            TextSource::Moravian => {
                let daily = self.fetch_moravian(Some(translation)).await?;
                for failure in daily.failures() {
                    log::warn!("Moravian passage {} unavailable", failure.reference);
                }
                (daily.reference, daily.text)
            }
            TextSource::Rcl => self.fetch_rcl(request.reading, Some(translation)).await?,
            TextSource::Run | TextSource::Paste => {
                let reference = reference.ok_or_else(|| StudyError::InvalidRequest {
                    message: "Reference is required".to_string(),
                })?;
                if !TextFetcher::validate_reference(reference) {
                    log::warn!("'{}' does not look like a standard reference", reference);
                }
                let pasted = request
                    .text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty());
                let text = match pasted {
                    Some(text) => text.to_string(),
                    None => self.fetch_text(reference, Some(translation)).await?,
                };
                (reference.to_string(), text)
            }
        };

        Ok(ResolvedText {
            reference,
            text,
            translation,
        })
    }

    // -- Generation ---------------------------------------------------------

    pub async fn generate_study(&self, request: &StudyRequest) -> Result<GeneratedStudy, StudyError> {
        let resolved = self.resolve_text(request).await?;
        let engine = self.engine(request.engine)?;
        let study = engine
            .generate_with_options(&resolved.text, &resolved.reference, &request.options)
            .await?;
        Ok(Self::finish(study, resolved, request.source))
    }

    /// As [`Self::generate_study`], reporting text deltas as they arrive.
    pub async fn generate_study_streaming(
        &self,
        request: &StudyRequest,
        on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
    ) -> Result<GeneratedStudy, StudyError> {
        let resolved = self.resolve_text(request).await?;
        let engine = self.engine(request.engine)?;
        let study = engine
            .generate_streaming(&resolved.text, &resolved.reference, &request.options, on_delta)
            .await?;
        Ok(Self::finish(study, resolved, request.source))
    }

    fn finish(mut study: StudyResult, resolved: ResolvedText, source: TextSource) -> GeneratedStudy {
        study.metadata.source = Some(source.to_string());
        study.metadata.translation = Some(resolved.translation.to_string());
        GeneratedStudy {
            study,
            biblical_text: resolved.text,
            translation: resolved.translation,
            source,
        }
    }

    // -- Validation ---------------------------------------------------------

    /// Review a study if validation is enabled; otherwise `skipped`.
    pub async fn validate(&self, biblical_text: &str, reference: &str, content: &str) -> ValidationResult {
        if !self.validation_enabled {
            return ValidationResult::skipped();
        }
        self.run_validation(biblical_text, reference, content).await
    }

    /// Review a study regardless of the configured switch.
    ///
    /// Transport failures become a `failed` result rather than an error.
    pub async fn run_validation(
        &self,
        biblical_text: &str,
        reference: &str,
        content: &str,
    ) -> ValidationResult {
        match self.client.validate_study(biblical_text, reference, content).await {
            Ok(reply) => {
                let result = ValidationResult::from_json(&reply);
                log::info!("Validation for {}: {}", reference, result);
                result
            }
            Err(e) => {
                log::warn!("Validation failed for {}: {}", reference, e);
                ValidationResult::failed(e.to_string())
            }
        }
    }
}

impl fmt::Debug for StudyGeneratorService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyGeneratorService")
            .field("fetcher", &self.fetcher)
            .field("engines", &self.list_engines())
            .field("validation_enabled", &self.validation_enabled)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engines::tests::{EchoClient, FIFTY_WORDS};
    use crate::preferences::StudyPreferences;
    use crate::text_fetcher::tests::{passage_html, StubPages};

    pub(crate) fn service_with(reply: &str, pages: StubPages, validation: bool) -> StudyGeneratorService {
        StudyGeneratorService::new(
            Arc::new(EchoClient::new(reply)),
            TextFetcher::with_source(Arc::new(pages), Translation::NRSVue),
            validation,
        )
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("RCL".parse::<TextSource>().unwrap(), TextSource::Rcl);
        assert!("email".parse::<TextSource>().is_err());
    }

    #[tokio::test]
    async fn test_paste_uses_given_text() {
        let service = service_with(FIFTY_WORDS, StubPages::default(), false);
        let request = StudyRequest {
            reference: Some("John 3:16".into()),
            text: Some("For God so loved".into()),
            ..Default::default()
        };
        let generated = service.generate_study(&request).await.unwrap();
        assert_eq!(generated.biblical_text, "For God so loved");
        assert_eq!(generated.study.metadata.source.as_deref(), Some("paste"));
        assert_eq!(generated.study.metadata.translation.as_deref(), Some("NRSVue"));
    }

    #[tokio::test]
    async fn test_paste_without_text_fetches_passage() {
        let pages = StubPages::default().with("John", &passage_html("For God so loved the world"));
        let service = service_with(FIFTY_WORDS, pages, false);
        let request = StudyRequest {
            reference: Some("John 3:16".into()),
            text: Some("   ".into()),
            ..Default::default()
        };
        let generated = service.generate_study(&request).await.unwrap();
        assert_eq!(generated.biblical_text, "For God so loved the world");
        assert_eq!(generated.study.metadata.source.as_deref(), Some("paste"));
    }

    #[tokio::test]
    async fn test_streaming_reports_deltas() {
        let service = service_with(FIFTY_WORDS, StubPages::default(), false);
        let request = StudyRequest {
            reference: Some("John 3:16".into()),
            text: Some("For God so loved".into()),
            ..Default::default()
        };
        let mut seen = String::new();
        let mut on_delta = |d: &str| seen.push_str(d);
        let generated = service
            .generate_study_streaming(&request, &mut on_delta)
            .await
            .unwrap();
        assert_eq!(generated.study.content, FIFTY_WORDS);
        assert_eq!(seen, FIFTY_WORDS);
    }

    #[tokio::test]
    async fn test_run_fetches_with_requested_translation() {
        let pages = StubPages::default().with("version=CEB", &passage_html("Love is patient"));
        let service = service_with(FIFTY_WORDS, pages, false);
        let request = StudyRequest {
            engine: EngineKind::Palimpsest,
            source: TextSource::Run,
            reference: Some("1 Corinthians 13".into()),
            translation: Some(Translation::CEB),
            options: GenerationOptions::with_preferences(StudyPreferences::default()),
            ..Default::default()
        };
        let generated = service.generate_study(&request).await.unwrap();
        assert_eq!(generated.biblical_text, "Love is patient");
        assert_eq!(generated.translation, Translation::CEB);
        assert!(generated.study.metadata.preferences.is_some());
        assert!(generated.study.metadata.layers.is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces() {
        let service = service_with(FIFTY_WORDS, StubPages::default(), false);
        let request = StudyRequest {
            source: TextSource::Run,
            reference: Some("John 1:1".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.generate_study(&request).await,
            Err(StudyError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_switch() {
        let service = service_with(r#"{"overall_score": 91, "recommendation": "approve"}"#, StubPages::default(), false);
        assert_eq!(service.validate("t", "r", "s").await, ValidationResult::skipped());

        let enabled = service_with(r#"{"overall_score": 91, "recommendation": "approve"}"#, StubPages::default(), true);
        let result = enabled.validate("t", "r", "s").await;
        assert_eq!(result.overall_score, 91);
        assert!(result.is_approved());
    }

    #[tokio::test]
    async fn test_validation_transport_error_becomes_failed() {
        let service = StudyGeneratorService::new(
            Arc::new(EchoClient::failing()),
            TextFetcher::with_source(Arc::new(StubPages::default()), Translation::NRSVue),
            true,
        );
        let result = service.validate("t", "Ruth 1", "s").await;
        assert!(result.validation_error.is_some());
        assert!(result.needs_review());
    }

    #[test]
    fn test_lists() {
        let service = service_with("x", StubPages::default(), false);
        assert_eq!(service.list_engines(), EngineKind::ALL.to_vec());
        assert_eq!(service.list_translations().len(), 5);
    }
}
