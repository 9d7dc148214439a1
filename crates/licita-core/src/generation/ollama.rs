//! Ollama HTTP client
//!
//! Uses reqwest against the non-streaming `/api/generate` endpoint.

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{extract_json, Generation, GenerationClient, GenerationError, GenerationRequest};
use crate::config::OllamaConfig;

const DEFAULT_TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 0.9;

/// Generation client for a local Ollama server
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn generate_once(&self, body: &GenerateBody<'_>) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(body)
            .send()
            .await
            .context("Ollama request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, detail.trim());
        }

        response
            .json::<GenerateResponse>()
            .await
            .context("Failed to decode Ollama response")
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .context("Failed to reach Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to list models: {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to decode model list")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the server is reachable and has the configured model.
    pub async fn health_check(&self) -> bool {
        match self.list_models().await {
            Ok(models) => model_matches(&models, &self.config.model),
            Err(e) => {
                tracing::warn!(url = %self.config.base_url, error = %e, "Ollama health check failed");
                false
            }
        }
    }
}

/// A model is available when installed under the exact name or under the
/// same family (the part before `:`).
pub fn model_matches(available: &[String], model: &str) -> bool {
    let family = model.split(':').next().unwrap_or(model);
    available
        .iter()
        .any(|name| name == model || name.starts_with(family))
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        let attempts = request.max_retries.unwrap_or(self.config.max_retries).max(1);
        let body = GenerateBody {
            model: &self.config.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                num_ctx: request.context_size.unwrap_or(self.config.context_size),
                temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                top_p: TOP_P,
            },
        };

        let started = Instant::now();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.generate_once(&body).await {
                Ok(response) => {
                    let text = response.response.trim().to_string();
                    let duration_ms = started.elapsed().as_millis() as u64;
                    tracing::debug!(
                        model = %self.config.model,
                        attempt,
                        duration_ms,
                        tokens_out = response.eval_count.unwrap_or(0),
                        "Generation complete"
                    );
                    return Ok(Generation {
                        json: extract_json(&text),
                        text,
                        duration_ms,
                        tokens_in: response.prompt_eval_count.unwrap_or(0),
                        tokens_out: response.eval_count.unwrap_or(0),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        model = %self.config.model,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Generation attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_base_delay * attempt).await;
                    }
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts,
            message: last_error
                .map(|e| format!("{e:#}"))
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config(max_retries: u32) -> OllamaConfig {
        OllamaConfig {
            // Port 1 is never an Ollama server
            base_url: "http://127.0.0.1:1".to_string(),
            max_retries,
            retry_base_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_retries() {
        let client = OllamaClient::new(unreachable_config(2));

        let err = client
            .generate(GenerationRequest::new("Extraia os itens"))
            .await
            .unwrap_err();

        let GenerationError::Exhausted { attempts, message } = err;
        assert_eq!(attempts, 2);
        assert!(message.contains("Ollama request failed"), "got: {message}");
    }

    #[tokio::test]
    async fn test_request_overrides_attempt_limit() {
        let client = OllamaClient::new(unreachable_config(5));
        let request = GenerationRequest {
            max_retries: Some(1),
            ..GenerationRequest::new("x")
        };

        let GenerationError::Exhausted { attempts, .. } = client.generate(request).await.unwrap_err();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client = OllamaClient::new(unreachable_config(1));
        assert!(!client.health_check().await);
    }

    #[test]
    fn test_model_matches_exact_and_family() {
        let installed = vec!["llama3.2:3b".to_string(), "qwen2.5:7b".to_string()];
        assert!(model_matches(&installed, "llama3.2:3b"));
        assert!(model_matches(&installed, "qwen2.5:14b"));
        assert!(!model_matches(&installed, "mistral:7b"));
        assert!(!model_matches(&[], "llama3.2:3b"));
    }

    #[test]
    fn test_generate_body_shape() {
        let body = GenerateBody {
            model: "llama3.2:3b",
            prompt: "p",
            system: None,
            stream: false,
            options: GenerateOptions {
                num_ctx: 32_768,
                temperature: 0.05,
                top_p: TOP_P,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_ctx"], 32_768);
        assert!(value.get("system").is_none());
    }
}
