//! Threshold engine: the passage is crossed through four thresholds, from
//! the ancient text to a practice for this week.

use std::sync::Arc;

use super::{Engine, EngineKind, GenerationOptions, PreparedStudy};
use crate::llms::ModelClient;
use crate::protocols::{threshold, Protocol};
use crate::utilities::errors::StudyError;

/// Four thresholds: archaeological dive, theological combustion, present
/// friction, embodied practice.
pub struct ThresholdEngine {
    client: Arc<dyn ModelClient>,
}

impl ThresholdEngine {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

impl Engine for ThresholdEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Threshold
    }

    fn protocol(&self) -> Protocol {
        threshold::PROTOCOL
    }

    fn client(&self) -> &dyn ModelClient {
        self.client.as_ref()
    }

    fn prepare(
        &self,
        text: &str,
        reference: &str,
        options: &GenerationOptions,
    ) -> Result<PreparedStudy, StudyError> {
        PreparedStudy::compile(
            &threshold::PROTOCOL,
            threshold::wrap_input(text, reference),
            options.preferences.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::tests::{EchoClient, FIFTY_WORDS};
    use crate::preferences::{StudyLength, StudyPreferences};
    use chrono::DateTime;

    #[tokio::test]
    async fn test_generate_packages_echoed_study() {
        let client = Arc::new(EchoClient::new(FIFTY_WORDS));
        let engine = ThresholdEngine::new(client.clone());

        let study = engine.generate("some text", "John 3:16").await.unwrap();

        assert_eq!(study.engine, EngineKind::Threshold);
        assert_eq!(study.reference, "John 3:16");
        assert_eq!(study.content, FIFTY_WORDS);
        assert_eq!(study.metadata.word_count, 50);
        assert!(DateTime::parse_from_rfc3339(&study.metadata.timestamp).is_ok());
        assert_eq!(study.metadata.constraints, threshold::output_constraints());
        assert!(study.metadata.preferences.is_none());
        assert!(study.metadata.layers.is_none());

        let calls = client.calls.lock().unwrap();
        let (message, system, max_tokens) = &calls[0];
        assert!(message.starts_with("Biblical Reference: John 3:16"));
        assert!(message.contains("some text"));
        assert_eq!(system, threshold::SYSTEM_PROMPT);
        assert_eq!(*max_tokens, 4000);
    }

    #[tokio::test]
    async fn test_generate_with_preferences_compiles_prompt() {
        let client = Arc::new(EchoClient::new(FIFTY_WORDS));
        let engine = ThresholdEngine::new(client.clone());
        let prefs = StudyPreferences {
            study_length: StudyLength::Long,
            focus_areas: Some("grief and hope".into()),
            ..Default::default()
        };

        let study = engine
            .generate_with_preferences("some text", "John 11:35", Some(&prefs))
            .await
            .unwrap();

        assert_eq!(study.metadata.preferences.as_ref(), Some(&prefs));
        assert_eq!(study.metadata.constraints.min_words, 5000);
        assert_eq!(study.metadata.constraints.max_tokens, Some(16000));

        let calls = client.calls.lock().unwrap();
        let (_, system, max_tokens) = &calls[0];
        assert!(system.contains("USER CUSTOMIZATION"));
        assert!(system.contains("grief and hope"));
        assert_eq!(*max_tokens, 16000);
    }

    #[tokio::test]
    async fn test_generate_with_default_preferences() {
        let client = Arc::new(EchoClient::new(FIFTY_WORDS));
        let engine = ThresholdEngine::new(client.clone());
        let study = engine
            .generate_with_preferences("t", "Mark 1:1", None)
            .await
            .unwrap();
        assert_eq!(study.metadata.preferences, Some(StudyPreferences::default()));
        assert_eq!(client.calls.lock().unwrap()[0].2, 8000);
    }
}
