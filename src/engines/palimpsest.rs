//! Palimpsest engine: five interpretive layers written over one another.

use std::sync::Arc;

use super::{Engine, EngineKind, GenerationOptions, PreparedStudy, StudyMetadata};
use crate::llms::ModelClient;
use crate::protocols::{palimpsest, Protocol};
use crate::utilities::errors::StudyError;

/// Five PaRDeS layers, each left visible beneath the next.
pub struct PalimpsestEngine {
    client: Arc<dyn ModelClient>,
}

impl PalimpsestEngine {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

impl Engine for PalimpsestEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Palimpsest
    }

    fn protocol(&self) -> Protocol {
        palimpsest::PROTOCOL
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
            &palimpsest::PROTOCOL,
            palimpsest::wrap_input(text, reference),
            options.preferences.as_ref(),
        )
    }

    fn decorate(&self, metadata: &mut StudyMetadata) {
        metadata.layers = Some(palimpsest::LAYERS.iter().map(|l| l.to_string()).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::tests::{EchoClient, FIFTY_WORDS};

    #[tokio::test]
    async fn test_generate_lists_layers() {
        let client = Arc::new(EchoClient::new(FIFTY_WORDS));
        let engine = PalimpsestEngine::new(client.clone());

        let study = engine.generate("In the beginning", "Genesis 1:1").await.unwrap();

        assert_eq!(study.engine, EngineKind::Palimpsest);
        assert_eq!(
            study.metadata.layers.unwrap(),
            vec!["peshat", "remez", "derash", "sod", "incarnation"]
        );
        assert_eq!(client.calls.lock().unwrap()[0].2, 5000);
    }
}
