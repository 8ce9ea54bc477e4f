//! Model API access.
//!
//! [`ModelClient`] is the seam between the engines and the remote model;
//! [`ClaudeClient`] is the Anthropic Messages API implementation.

pub mod claude_client;
pub mod streaming;

use async_trait::async_trait;

use crate::utilities::errors::GenerationError;

pub use claude_client::ClaudeClient;
pub use streaming::{StreamAccumulator, StreamChunk, StreamReceiver};

/// Anything that can write and review studies.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One non-streaming generation. `user_message` is the wrapped passage;
    /// `reference` is carried into errors.
    async fn generate_study(
        &self,
        user_message: &str,
        reference: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;

    /// Streaming generation.
    ///
    /// Clients without a streaming transport emit the whole study as a
    /// single delta followed by `Done`.
    async fn generate_study_streaming(
        &self,
        user_message: &str,
        reference: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<Box<dyn StreamReceiver>, GenerationError> {
        let content = self
            .generate_study(user_message, reference, system_prompt, max_tokens)
            .await?;
        Ok(streaming::completed_stream(content))
    }

    /// Review `study_content` against the passage with the validator model.
    ///
    /// Returns the validator's raw reply, which is expected but not
    /// guaranteed to be JSON.
    async fn validate_study(
        &self,
        biblical_text: &str,
        reference: &str,
        study_content: &str,
    ) -> Result<String, GenerationError>;
}
