//! Runtime configuration.
//!
//! Defaults match the values the pipeline was tuned with; environment
//! variables override them and everything is validated once at startup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_CONTEXT_SIZE: u32 = 32_768;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Chunk sizes, in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Upper bound for a section-aware chunk
    pub max_chunk_chars: usize,
    /// Characters carried from one section sub-chunk into the next
    pub overlap_chars: usize,
    /// Window size for the exhaustive item scan
    pub item_window_chars: usize,
    /// Characters shared by consecutive item windows
    pub item_overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 14_000,
            overlap_chars: 800,
            item_window_chars: 16_000,
            item_overlap_chars: 2_000,
        }
    }
}

impl ChunkingConfig {
    /// Overlaps must stay below the newline search thresholds so that every
    /// split step moves forward.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 || self.item_window_chars == 0 {
            bail!("chunk sizes must be greater than zero");
        }
        if self.overlap_chars * 2 >= self.max_chunk_chars {
            bail!(
                "overlap_chars ({}) must be less than half of max_chunk_chars ({})",
                self.overlap_chars,
                self.max_chunk_chars
            );
        }
        if self.item_overlap_chars * 5 >= self.item_window_chars * 3 {
            bail!(
                "item_overlap_chars ({}) must be less than 60% of item_window_chars ({})",
                self.item_overlap_chars,
                self.item_window_chars
            );
        }
        Ok(())
    }
}

/// What happens to items already merged when one item chunk fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFailurePolicy {
    /// Discard the partial item list; nothing from the item stage is committed
    #[default]
    FailClosed,
    /// Record and insert the items merged so far, then fail the run
    PersistPartial,
}

/// Connection settings for the Ollama inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// `num_ctx` sent with every request
    pub context_size: u32,
    /// Attempts per generation call before giving up
    pub max_retries: u32,
    /// Backoff after attempt `n` is `retry_base_delay * n`
    pub retry_base_delay: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            context_size: DEFAULT_CONTEXT_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// Settings the orchestrator needs for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub item_failure_policy: ItemFailurePolicy,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/licita), holds run snapshots
    pub data_dir: PathBuf,
    /// Optional training-hint file
    pub training_file: Option<PathBuf>,
    pub ollama: OllamaConfig,
    pub chunking: ChunkingConfig,
    pub item_failure_policy: ItemFailurePolicy,
}

impl Config {
    /// Defaults without looking at the environment
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("licita");

        Self {
            data_dir,
            training_file: None,
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            item_failure_policy: ItemFailurePolicy::default(),
        }
    }

    /// Defaults overridden by environment variables, validated.
    ///
    /// Recognized: `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `LICITA_CONTEXT_SIZE`,
    /// `LICITA_MAX_RETRIES`, `LICITA_DATA_DIR`, `LICITA_TRAINING_FILE`,
    /// `LICITA_ITEM_FAILURE_POLICY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::load_or_default();

        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            config.ollama.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.ollama.model = model;
        }
        if let Some(value) = lookup("LICITA_CONTEXT_SIZE") {
            config.ollama.context_size = value
                .parse()
                .with_context(|| format!("Invalid LICITA_CONTEXT_SIZE: {value}"))?;
        }
        if let Some(value) = lookup("LICITA_MAX_RETRIES") {
            config.ollama.max_retries = value
                .parse()
                .with_context(|| format!("Invalid LICITA_MAX_RETRIES: {value}"))?;
        }
        if let Some(path) = lookup("LICITA_DATA_DIR") {
            config.data_dir = PathBuf::from(path);
        }
        if let Some(path) = lookup("LICITA_TRAINING_FILE") {
            config.training_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("LICITA_ITEM_FAILURE_POLICY") {
            config.item_failure_policy = match value.as_str() {
                "fail_closed" => ItemFailurePolicy::FailClosed,
                "persist_partial" => ItemFailurePolicy::PersistPartial,
                other => bail!("Invalid LICITA_ITEM_FAILURE_POLICY: {other}"),
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ollama.base_url.is_empty() {
            bail!("Ollama base URL is empty");
        }
        if self.ollama.model.is_empty() {
            bail!("Ollama model is empty");
        }
        if self.ollama.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        self.chunking.validate()
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            chunking: self.chunking.clone(),
            item_failure_policy: self.item_failure_policy,
        }
    }

    /// Directory where `analyze` writes store snapshots by default
    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn snapshot_path(&self, document_id: &str) -> PathBuf {
        self.snapshots_dir().join(format!("{document_id}.json"))
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.snapshots_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.ollama.model, DEFAULT_MODEL);
        assert_eq!(config.ollama.context_size, 32_768);
        assert_eq!(config.chunking, ChunkingConfig::default());
        assert_eq!(config.item_failure_policy, ItemFailurePolicy::FailClosed);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OLLAMA_BASE_URL", "http://gpu-box:11434/"),
            ("OLLAMA_MODEL", "qwen2.5:14b"),
            ("LICITA_MAX_RETRIES", "5"),
            ("LICITA_ITEM_FAILURE_POLICY", "persist_partial"),
        ]))
        .unwrap();

        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama.model, "qwen2.5:14b");
        assert_eq!(config.ollama.max_retries, 5);
        assert_eq!(
            config.item_failure_policy,
            ItemFailurePolicy::PersistPartial
        );
        assert_eq!(
            config.pipeline().item_failure_policy,
            ItemFailurePolicy::PersistPartial
        );
    }

    #[test]
    fn test_data_dir_holds_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("licita");
        let config =
            Config::from_lookup(lookup(&[("LICITA_DATA_DIR", root.to_str().unwrap())])).unwrap();

        config.ensure_dirs().unwrap();

        assert!(root.join("snapshots").is_dir());
        assert_eq!(
            config.snapshot_path("doc-1"),
            root.join("snapshots").join("doc-1.json")
        );
    }

    #[test]
    fn test_invalid_numbers_fail_fast() {
        let err = Config::from_lookup(lookup(&[("LICITA_CONTEXT_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("LICITA_CONTEXT_SIZE"));

        assert!(Config::from_lookup(lookup(&[("LICITA_MAX_RETRIES", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LICITA_ITEM_FAILURE_POLICY", "maybe")])).is_err());
    }

    #[test]
    fn test_chunking_overlap_must_allow_progress() {
        let config = ChunkingConfig {
            item_window_chars: 1_000,
            item_overlap_chars: 600,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ChunkingConfig {
            max_chunk_chars: 1_000,
            overlap_chars: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
