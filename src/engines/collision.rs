//! Collision engine: the passage is driven into five contemporary vectors,
//! drawn fresh for every study.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use super::{Engine, EngineKind, GenerationOptions, PreparedStudy, StudyMetadata, StudyResult};
use crate::llms::ModelClient;
use crate::protocols::collision::{self, CollisionVectors, VectorCategory};
use crate::protocols::Protocol;
use crate::utilities::errors::StudyError;

pub struct CollisionEngine {
    client: Arc<dyn ModelClient>,
}

impl CollisionEngine {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// One vector per category, drawn at random.
    ///
    /// A `custom_vector` that matches an option (ignoring case) pins every
    /// category whose list contains it; the other categories are drawn.
    pub fn generate_collision_vectors(custom_vector: Option<&str>) -> CollisionVectors {
        Self::generate_collision_vectors_with(&mut rand::thread_rng(), custom_vector)
    }

    pub fn generate_collision_vectors_with<R: Rng + ?Sized>(
        rng: &mut R,
        custom_vector: Option<&str>,
    ) -> CollisionVectors {
        let custom = custom_vector.map(str::trim).filter(|v| !v.is_empty());
        CollisionVectors::from_fn(|category| match custom {
            Some(value) if category.contains(value) => value.to_string(),
            _ => category
                .options()
                .choose(rng)
                .map(|o| o.to_string())
                .unwrap_or_default(),
        })
    }

    /// Generate with explicit collision controls. `custom_vectors` wins
    /// over `collision_vector` when both are given.
    pub async fn generate_collision(
        &self,
        text: &str,
        reference: &str,
        collision_vector: Option<&str>,
        custom_vectors: Option<CollisionVectors>,
    ) -> Result<StudyResult, StudyError> {
        let options = GenerationOptions {
            preferences: None,
            collision_vector: collision_vector.map(str::to_string),
            custom_vectors,
        };
        self.generate_with_options(text, reference, &options).await
    }

    /// Option lists, for one category or all of them.
    pub fn list_collision_vectors(
        category: Option<VectorCategory>,
    ) -> Vec<(VectorCategory, &'static [&'static str])> {
        match category {
            Some(c) => vec![(c, c.options())],
            None => VectorCategory::ALL.iter().map(|c| (*c, c.options())).collect(),
        }
    }
}

impl Engine for CollisionEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Collision
    }

    fn protocol(&self) -> Protocol {
        collision::PROTOCOL
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
        let vectors = match &options.custom_vectors {
            Some(vectors) => vectors.clone(),
            None => Self::generate_collision_vectors(options.collision_vector.as_deref()),
        };
        log::debug!("Collision vectors for {}: {:?}", reference, vectors);

        let mut prepared = PreparedStudy::compile(
            &collision::PROTOCOL,
            collision::wrap_input(text, reference, &vectors),
            options.preferences.as_ref(),
        )?;
        prepared.collision_vectors = Some(vectors);
        Ok(prepared)
    }

    fn decorate(&self, metadata: &mut StudyMetadata) {
        metadata.steps = Some(collision::STEPS.iter().map(|s| s.to_string()).collect());
    }
}
