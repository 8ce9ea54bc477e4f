//! Anthropic Messages API client.
//!
//! One request per call, no retries. Every failure, whatever its cause,
//! becomes a [`GenerationError`] for the reference being studied.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use super::streaming::{ChannelStreamReceiver, StreamChunk, StreamReceiver, StreamUsage};
use super::ModelClient;
use crate::config::{Config, DEFAULT_MODEL};
use crate::protocols::validation::{self, ValidationConfig};
use crate::utilities::errors::GenerationError;
use crate::utilities::string_utils::truncate_chars;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const STREAM_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

/// Client for study generation and validation calls.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    api_key: String,
    model: String,
    use_caching: bool,
    base_url: String,
    validation: ValidationConfig,
    http: reqwest::Client,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>, use_caching: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            use_caching,
            base_url: DEFAULT_BASE_URL.to_string(),
            validation: ValidationConfig::default(),
            http,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(
            config.anthropic_api_key.clone(),
            Some(config.model.clone()),
            config.enable_prompt_caching,
        );
        client.validation.model = config.validation_model.clone();
        client
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The `system` parameter: a plain string, or a cache-annotated text
    /// block when caching is enabled. Both carry the same prompt.
    pub fn system_param(&self, system_prompt: &str) -> Value {
        if self.use_caching {
            json!([{
                "type": "text",
                "text": system_prompt,
                "cache_control": {"type": "ephemeral"}
            }])
        } else {
            Value::String(system_prompt.to_string())
        }
    }

    pub fn build_request_body(
        &self,
        model: &str,
        user_message: &str,
        system_prompt: &str,
        max_tokens: u32,
        temperature: Option<f64>,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "system": self.system_param(system_prompt),
            "messages": [{"role": "user", "content": user_message}],
        });
        if let Some(t) = temperature {
            body["temperature"] = json!(t);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Concatenate the text blocks of a Messages API response.
    pub fn parse_response(response: &Value) -> Result<String, String> {
        if response.get("type").and_then(Value::as_str) == Some("error") {
            let message = response
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown API error");
            return Err(format!("Claude API error: {}", message));
        }
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or("No content array in response")?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        if text.is_empty() {
            return Err("Response contained no text".to_string());
        }
        Ok(text)
    }

    fn log_usage(response: &Value) {
        if let Some(usage) = response.get("usage") {
            let mut counted = StreamUsage::default();
            counted.absorb(usage);
            log::debug!(
                "Claude usage: input={}, output={}, cache_read={}, cache_write={}",
                counted.input_tokens,
                counted.output_tokens,
                counted.cache_read_input_tokens,
                counted.cache_creation_input_tokens,
            );
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, String> {
        if self.api_key.trim().is_empty() {
            return Err("ANTHROPIC_API_KEY is not set".to_string());
        }
        let response = self
            .http
            .post(self.endpoint())
            .header("content-type", "application/json")
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(format!(
            "Claude API error ({}): {}",
            status,
            truncate_chars(&detail, 500)
        ))
    }

    async fn complete(&self, body: Value) -> Result<String, String> {
        let response = self.post(&body).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| format!("could not decode response: {}", e))?;
        Self::log_usage(&payload);
        Self::parse_response(&payload)
    }
}

#[async_trait]
impl ModelClient for ClaudeClient {
    async fn generate_study(
        &self,
        user_message: &str,
        reference: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        log::debug!(
            "Generating study for {} (model={}, max_tokens={})",
            reference,
            self.model,
            max_tokens
        );
        let body = self.build_request_body(&self.model, user_message, system_prompt, max_tokens, None, false);
        self.complete(body)
            .await
            .map_err(|message| GenerationError::new(reference, message))
    }

    async fn generate_study_streaming(
        &self,
        user_message: &str,
        reference: &str,
        system_prompt: &str,
        max_tokens: u32,
    ) -> Result<Box<dyn StreamReceiver>, GenerationError> {
        let body = self.build_request_body(&self.model, user_message, system_prompt, max_tokens, None, true);
        let response = self
            .post(&body)
            .await
            .map_err(|message| GenerationError::new(reference, message))?;

        let (tx, rx) = ChannelStreamReceiver::pair(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            let mut state = StreamState::default();

            while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(StreamChunk::Error { message: format!("stream interrupted: {}", e) }).await;
                        return;
                    }
                };
                for event in decoder.push(&chunk) {
                    if let Some(out) = state.apply(&event) {
                        let finished = !matches!(out, StreamChunk::TextDelta { .. });
                        if tx.send(out).await.is_err() || finished {
                            return;
                        }
                    }
                }
            }
            // Connection closed without message_stop.
            let _ = tx
                .send(StreamChunk::Error {
                    message: "stream ended before completion".to_string(),
                })
                .await;
        });

        Ok(Box::new(rx))
    }

    async fn validate_study(
        &self,
        biblical_text: &str,
        reference: &str,
        study_content: &str,
    ) -> Result<String, GenerationError> {
        let user_message = validation::wrap_input(biblical_text, reference, study_content);
        let body = self.build_request_body(
            &self.validation.model,
            &user_message,
            validation::SYSTEM_PROMPT,
            self.validation.max_tokens,
            Some(self.validation.temperature),
            false,
        );
        self.complete(body)
            .await
            .map_err(|message| GenerationError::new(reference, message))
    }
}

// ---------------------------------------------------------------------------
// Server-sent events
// ---------------------------------------------------------------------------

/// Splits a byte stream into SSE `data:` payloads parsed as JSON.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes; returns every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let block = String::from_utf8_lossy(&raw);
            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str(&data.join("\n")) {
                Ok(value) => events.push(value),
                Err(e) => log::debug!("Skipping undecodable stream event: {}", e),
            }
        }
        events
    }
}

/// Folds Messages API stream events into chunks.
#[derive(Debug, Default)]
pub struct StreamState {
    text: String,
    usage: StreamUsage,
}

impl StreamState {
    pub fn apply(&mut self, event: &Value) -> Option<StreamChunk> {
        match event.get("type").and_then(Value::as_str)? {
            "message_start" => {
                if let Some(usage) = event.pointer("/message/usage") {
                    self.usage.absorb(usage);
                }
                None
            }
            "content_block_delta" => {
                let delta = event.get("delta")?;
                if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
                    return None;
                }
                let text = delta.get("text").and_then(Value::as_str)?;
                self.text.push_str(text);
                Some(StreamChunk::TextDelta {
                    text: text.to_string(),
                })
            }
            "message_delta" => {
                if let Some(usage) = event.get("usage") {
                    self.usage.absorb(usage);
                }
                None
            }
            "message_stop" => {
                log::debug!(
                    "Claude stream usage: input={}, output={}, cache_read={}",
                    self.usage.input_tokens,
                    self.usage.output_tokens,
                    self.usage.cache_read_input_tokens
                );
                Some(StreamChunk::Done {
                    content: std::mem::take(&mut self.text),
                    usage: Some(self.usage.clone()),
                })
            }
            "error" => Some(StreamChunk::Error {
                message: event
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown stream error")
                    .to_string(),
            }),
            _ => None,
        }
    }
}
