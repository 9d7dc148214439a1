//! Operator-curated hints appended to stage prompts.
//!
//! A source supplies extra rules and approved few-shot examples per stage,
//! plus the item categories currently of interest. Having no hints at all is
//! a normal state.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::document::prefix_chars;
use crate::stages::Stage;

/// Examples included per prompt
pub const EXAMPLE_LIMIT: usize = 3;
/// Characters of an example input shown in the prompt
const EXAMPLE_INPUT_CHARS: usize = 500;
/// Categories used when the source has none configured
pub const DEFAULT_CATEGORIES: [&str; 2] = ["mobiliario", "assento"];

/// An input excerpt with the output the model should have produced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainingExample {
    pub input: String,
    pub expected_output: Value,
}

#[async_trait]
pub trait TrainingSource: Send + Sync {
    /// Active rules for a stage, oldest first.
    async fn rules(&self, stage: Stage) -> Result<Vec<String>>;

    /// Approved examples for a stage, newest first, at most `limit`.
    async fn examples(&self, stage: Stage, limit: usize) -> Result<Vec<TrainingExample>>;

    /// Active item categories; `None` when the source has no category list.
    async fn active_categories(&self) -> Result<Option<Vec<String>>>;
}

/// Source with no hints.
pub struct NoTraining;

#[async_trait]
impl TrainingSource for NoTraining {
    async fn rules(&self, _stage: Stage) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn examples(&self, _stage: Stage, _limit: usize) -> Result<Vec<TrainingExample>> {
        Ok(Vec::new())
    }

    async fn active_categories(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FileRule {
    text: String,
    #[serde(default = "default_true")]
    active: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct FileExample {
    #[serde(flatten)]
    example: TrainingExample,
    #[serde(default = "default_true")]
    approved: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TrainingFile {
    #[serde(default)]
    rules: HashMap<Stage, Vec<FileRule>>,
    #[serde(default)]
    examples: HashMap<Stage, Vec<FileExample>>,
    #[serde(default)]
    categories: Option<Vec<String>>,
}

/// Hints loaded once from a JSON file.
///
/// ```json
/// {
///   "rules": { "itens_completos": [{ "text": "Copy lot names verbatim" }] },
///   "examples": { "dados_basicos": [{ "input": "...", "expected_output": {} }] },
///   "categories": ["mobiliario", "assento"]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileTraining {
    file: TrainingFile,
}

impl FileTraining {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read training file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid training file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: TrainingFile = serde_json::from_str(content)?;
        Ok(Self { file })
    }
}

#[async_trait]
impl TrainingSource for FileTraining {
    async fn rules(&self, stage: Stage) -> Result<Vec<String>> {
        Ok(self
            .file
            .rules
            .get(&stage)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|r| r.active)
                    .map(|r| r.text.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn examples(&self, stage: Stage, limit: usize) -> Result<Vec<TrainingExample>> {
        Ok(self
            .file
            .examples
            .get(&stage)
            .map(|examples| {
                examples
                    .iter()
                    .filter(|e| e.approved)
                    .take(limit)
                    .map(|e| e.example.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_categories(&self) -> Result<Option<Vec<String>>> {
        Ok(self.file.categories.clone())
    }
}

/// `- rule` lines.
pub fn render_rules(rules: &[String]) -> String {
    rules
        .iter()
        .map(|rule| format!("- {rule}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered examples with truncated input and pretty-printed output.
pub fn render_examples(examples: &[TrainingExample]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, example)| {
            let expected = serde_json::to_string_pretty(&example.expected_output)
                .unwrap_or_else(|_| example.expected_output.to_string());
            format!(
                "EXAMPLE {}:\nInput: {}...\nExpected output: {}",
                i + 1,
                prefix_chars(&example.input, EXAMPLE_INPUT_CHARS),
                expected
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rules and examples for one stage, rendered for a prompt.
///
/// A failing source is logged and treated as empty: hints never block a run.
pub async fn load_stage_hints(source: &dyn TrainingSource, stage: Stage) -> String {
    let mut sections = Vec::new();

    if stage.uses_rules() {
        match source.rules(stage).await {
            Ok(rules) if !rules.is_empty() => sections.push(render_rules(&rules)),
            Ok(_) => {}
            Err(e) => tracing::warn!(stage = %stage, error = %e, "Failed to load training rules"),
        }
    }

    if stage.uses_examples() {
        match source.examples(stage, EXAMPLE_LIMIT).await {
            Ok(examples) if !examples.is_empty() => sections.push(render_examples(&examples)),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Failed to load training examples")
            }
        }
    }

    sections.join("\n\n")
}

/// Active categories, falling back to [`DEFAULT_CATEGORIES`] when the source
/// has none or an empty list.
pub async fn load_categories(source: &dyn TrainingSource) -> Vec<String> {
    match source.active_categories().await {
        Ok(Some(categories)) if !categories.is_empty() => categories,
        Ok(_) => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load active categories");
            DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
        }
    }
}
