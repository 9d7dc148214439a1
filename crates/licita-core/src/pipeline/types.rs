//! Run outcome types.

use serde::Serialize;

use crate::generation::GenerationError;
use crate::stages::{
    BasicData, EstimatedValue, ExecutiveSummary, ExtractedItem, Feasibility, Requirements, Stage,
};

/// Why a run stopped. Every variant is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Nothing but whitespace came out of text extraction
    #[error("document {document_id} has no extractable text")]
    EmptyDocument { document_id: String },

    /// The generation client gave up after its retries
    #[error("{stage} stage failed: {source}")]
    Generation {
        stage: Stage,
        source: GenerationError,
    },

    /// A storage write failed
    #[error("failed to persist {target}: {error:#}")]
    Persistence {
        target: &'static str,
        error: anyhow::Error,
    },
}

impl PipelineError {
    pub(crate) fn persistence(target: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| PipelineError::Persistence { target, error }
    }

    /// Stage whose generation call failed, if that is the cause.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Generation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Everything a successful run extracted.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub document_id: String,
    pub basic_data: BasicData,
    pub estimated_value: EstimatedValue,
    /// Deduplicated, in order of first appearance
    pub items: Vec<ExtractedItem>,
    pub requirements: Requirements,
    pub feasibility: Feasibility,
    pub summary: ExecutiveSummary,
    /// Windows scanned by the item stage
    pub item_windows: usize,
    pub duration_ms: u64,
}
