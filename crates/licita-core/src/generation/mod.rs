//! Text generation behind a single prompt -> text round trip.
//!
//! The pipeline only depends on [`GenerationClient`]; [`OllamaClient`] is the
//! HTTP implementation used by the CLI.

mod ollama;

pub use ollama::{model_matches, OllamaClient};

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

/// One generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Sampling temperature; the client default applies when unset
    pub temperature: Option<f32>,
    /// Context window in tokens; the client default applies when unset
    pub context_size: Option<u32>,
    /// Attempts before giving up; the client default applies when unset
    pub max_retries: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Output of a successful generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    /// Raw model output, trimmed
    pub text: String,
    /// First JSON object found in `text`, if any
    pub json: Option<Value>,
    /// Wall time including retries
    pub duration_ms: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Every attempt failed
    #[error("generation failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

/// Unified generation interface
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one prompt, retrying transport failures up to the attempt limit.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError>;

    /// Model identifier recorded with results
    fn model_id(&self) -> &str;
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence pattern is valid"))
}

/// Pull a JSON object out of free-form model output.
///
/// A fenced code block is tried first, then the span from the first `{` to
/// the last `}`. Anything that does not parse to an object yields `None`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(captures) = fence_pattern().captures(text) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last <= first {
        return None;
    }
    serde_json::from_str::<Value>(&text[first..=last])
        .ok()
        .filter(Value::is_object)
}
