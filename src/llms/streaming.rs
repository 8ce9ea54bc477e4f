//! Streaming study generation.
//!
//! A streaming call yields a finite, non-restartable sequence of
//! [`StreamChunk`]s through a [`StreamReceiver`]. Text deltas are meant for
//! progress display; the final [`StreamChunk::Done`] carries the assembled
//! text, and [`StreamAccumulator`] reassembles it for callers that only
//! watch deltas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// StreamChunk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A fragment of generated text.
    TextDelta { text: String },

    /// The stream finished. Contains the complete text.
    Done {
        content: String,
        usage: Option<StreamUsage>,
    },

    /// The stream ended with an error.
    Error { message: String },
}

/// Token usage reported over a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_input_tokens: i64,
    pub cache_creation_input_tokens: i64,
}

impl StreamUsage {
    /// Merge counters from an Anthropic `usage` object; absent keys are kept.
    pub fn absorb(&mut self, usage: &Value) {
        let read = |key: &str| usage.get(key).and_then(Value::as_i64);
        if let Some(v) = read("input_tokens") {
            self.input_tokens = v;
        }
        if let Some(v) = read("output_tokens") {
            self.output_tokens = v;
        }
        if let Some(v) = read("cache_read_input_tokens") {
            self.cache_read_input_tokens = v;
        }
        if let Some(v) = read("cache_creation_input_tokens") {
            self.cache_creation_input_tokens = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

/// Source of stream chunks.
#[async_trait]
pub trait StreamReceiver: Send + Sync {
    /// Next chunk, or `None` once the stream is exhausted.
    async fn next(&mut self) -> Option<StreamChunk>;
}

/// A `StreamReceiver` backed by a tokio mpsc channel fed from a task.
pub struct ChannelStreamReceiver {
    rx: tokio::sync::mpsc::Receiver<StreamChunk>,
}

impl ChannelStreamReceiver {
    pub fn pair(buffer: usize) -> (tokio::sync::mpsc::Sender<StreamChunk>, Self) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl StreamReceiver for ChannelStreamReceiver {
    async fn next(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }
}

/// A stream over an already complete text: one delta, then `Done`.
pub fn completed_stream(content: String) -> Box<dyn StreamReceiver> {
    let (tx, rx) = ChannelStreamReceiver::pair(2);
    // Capacity covers both sends, so neither can fail while `rx` is alive.
    let _ = tx.try_send(StreamChunk::TextDelta {
        text: content.clone(),
    });
    let _ = tx.try_send(StreamChunk::Done {
        content,
        usage: None,
    });
    Box::new(rx)
}

// ---------------------------------------------------------------------------
// StreamAccumulator
// ---------------------------------------------------------------------------

/// Assembles the full text from chunks.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    usage: Option<StreamUsage>,
    error: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk, returning `true` once the stream is finished.
    pub fn push(&mut self, chunk: &StreamChunk) -> bool {
        match chunk {
            StreamChunk::TextDelta { text } => {
                self.text.push_str(text);
                false
            }
            StreamChunk::Done { content, usage } => {
                self.text = content.clone();
                self.usage = usage.clone();
                true
            }
            StreamChunk::Error { message } => {
                self.error = Some(message.clone());
                true
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn usage(&self) -> Option<&StreamUsage> {
        self.usage.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Drain `receiver`, calling `on_delta` for each text fragment.
///
/// Returns the complete text or the stream's error message.
pub async fn drain(
    mut receiver: Box<dyn StreamReceiver>,
    on_delta: &mut (dyn for<'d> FnMut(&'d str) + Send),
) -> Result<String, String> {
    let mut acc = StreamAccumulator::new();
    while let Some(chunk) = receiver.next().await {
        if let StreamChunk::TextDelta { text } = &chunk {
            on_delta(text);
        }
        if acc.push(&chunk) {
            break;
        }
    }
    match acc.error() {
        Some(message) => Err(message.to_string()),
        None => Ok(acc.into_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_serde() {
        let delta = StreamChunk::TextDelta { text: "In the ".into() };
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json["type"], "text_delta");
        let back: StreamChunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn test_accumulator_deltas_then_done() {
        let mut acc = StreamAccumulator::new();
        assert!(!acc.push(&StreamChunk::TextDelta { text: "In the ".into() }));
        assert!(!acc.push(&StreamChunk::TextDelta { text: "beginning".into() }));
        assert_eq!(acc.text(), "In the beginning");
        assert!(acc.push(&StreamChunk::Done {
            content: "In the beginning".into(),
            usage: Some(StreamUsage {
                output_tokens: 3,
                ..Default::default()
            }),
        }));
        assert_eq!(acc.usage().unwrap().output_tokens, 3);
        assert!(acc.error().is_none());
    }

    #[test]
    fn test_accumulator_error() {
        let mut acc = StreamAccumulator::new();
        assert!(acc.push(&StreamChunk::Error { message: "overloaded".into() }));
        assert_eq!(acc.error(), Some("overloaded"));
    }

    #[test]
    fn test_usage_absorb() {
        let mut usage = StreamUsage::default();
        usage.absorb(&serde_json::json!({"input_tokens": 120, "cache_read_input_tokens": 100}));
        usage.absorb(&serde_json::json!({"output_tokens": 40}));
        assert_eq!(usage.input_tokens, 120);
        assert_eq!(usage.output_tokens, 40);
        assert_eq!(usage.cache_read_input_tokens, 100);
    }

    #[tokio::test]
    async fn test_completed_stream_drains() {
        let mut seen = Vec::new();
        let text = drain(completed_stream("whole study".into()), &mut |d: &str| seen.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(text, "whole study");
        assert_eq!(seen, vec!["whole study"]);
    }

    #[tokio::test]
    async fn test_channel_stream_is_finite() {
        let (tx, mut rx) = ChannelStreamReceiver::pair(4);
        tx.send(StreamChunk::TextDelta { text: "a".into() }).await.unwrap();
        drop(tx);
        assert!(rx.next().await.is_some());
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drain_surfaces_error() {
        let (tx, rx) = ChannelStreamReceiver::pair(4);
        tx.send(StreamChunk::TextDelta { text: "partial".into() }).await.unwrap();
        tx.send(StreamChunk::Error { message: "connection reset".into() }).await.unwrap();
        drop(tx);
        let result = drain(Box::new(rx), &mut |_: &str| {}).await;
        assert_eq!(result, Err("connection reset".to_string()));
    }
}
