//! The write path to durable storage.
//!
//! The pipeline talks to storage only through [`PersistenceGateway`]. Row
//! types here are what gets written; the orchestrator builds them from stage
//! outputs.

mod memory;

pub use memory::{
    DocumentRecord, MemoryStore, StoreSnapshot, StoredCertification, StoredItem,
    StoredOrganization, StoredRequirement, StoredStageResult,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stages::{Difficulty, Organization, RequirementCategory, Stage};

/// Rows per insert call
pub const INSERT_BATCH_SIZE: usize = 100;

/// Lifecycle of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Extracting,
    Analyzing,
    Completed,
    Error,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Extracting => write!(f, "extracting"),
            DocumentStatus::Analyzing => write!(f, "analyzing"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Error => write!(f, "error"),
        }
    }
}

/// Canonical document fields to overwrite. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub notice_number: Option<String>,
    pub process_number: Option<String>,
    pub modality: Option<String>,
    pub object: Option<String>,
    pub organization_id: Option<String>,
    pub estimated_value: Option<f64>,
    pub proposal_opening: Option<String>,
    pub closing_date: Option<String>,
    pub execution_days: Option<i64>,
    pub delivery_address: Option<String>,
    pub delivery_municipality: Option<String>,
    pub delivery_state: Option<String>,
    pub payment_terms: Option<String>,
    pub judgment_criterion: Option<String>,
    pub feasibility_score: Option<f64>,
    pub feasibility_verdict: Option<String>,
    pub executive_summary: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy every field set in `other` over this one.
    pub fn apply(&mut self, other: &DocumentPatch) {
        macro_rules! overwrite {
            ($($field:ident),* $(,)?) => {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            };
        }
        overwrite!(
            notice_number,
            process_number,
            modality,
            object,
            organization_id,
            estimated_value,
            proposal_opening,
            closing_date,
            execution_days,
            delivery_address,
            delivery_municipality,
            delivery_state,
            payment_terms,
            judgment_criterion,
            feasibility_score,
            feasibility_verdict,
            executive_summary,
            completed_at,
        );
    }
}

/// Position of an item-stage window inside the full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub index: usize,
    pub total: usize,
}

/// Audit record of one generation call (or of an aggregate over several).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub model: String,
    pub prompt_version: String,
    /// Chunks that fed the call
    pub input_chunk_count: usize,
    pub json: Value,
    pub duration_ms: u64,
    /// False when the model output held no parsable JSON object
    pub succeeded: bool,
    /// Set on per-window records of the item stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<ChunkPosition>,
}

/// An item line to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub item_number: String,
    pub lot_number: Option<String>,
    pub lot_name: Option<String>,
    pub description: String,
    pub detailed_description: Option<String>,
    pub specifications: Value,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub unit_value: Option<f64>,
    pub total_value: Option<f64>,
    pub catalog_code: Option<String>,
    /// Always "material" for extracted items
    pub item_kind: String,
    pub category: Option<String>,
    pub quantity_confidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRow {
    pub category: RequirementCategory,
    pub description: String,
    pub mandatory: bool,
    pub difficulty: Difficulty,
    pub note: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationRow {
    pub name: String,
    pub kind: String,
    pub standard: Option<String>,
    pub description: Option<String>,
    pub mandatory: bool,
    pub applies_to: Option<String>,
}

/// Feasibility verdict for a stored item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFeasibility {
    pub can_produce: bool,
    pub score: Option<f64>,
    pub justification: Option<String>,
    pub restrictions: Vec<String>,
}

/// The only write path to durable storage.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Set the lifecycle status, with a message for `error`.
    async fn set_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        message: Option<&str>,
    ) -> Result<()>;

    async fn update_document(&self, document_id: &str, patch: &DocumentPatch) -> Result<()>;

    /// Append an audit record.
    async fn record_stage(&self, document_id: &str, result: &StageResult) -> Result<()>;

    /// Insert or update an organization keyed by its CNPJ, returning its id.
    async fn upsert_organization(&self, cnpj: &str, organization: &Organization)
        -> Result<String>;

    async fn insert_items(&self, document_id: &str, rows: &[ItemRow]) -> Result<()>;

    async fn insert_requirements(&self, document_id: &str, rows: &[RequirementRow]) -> Result<()>;

    async fn insert_certifications(
        &self,
        document_id: &str,
        rows: &[CertificationRow],
    ) -> Result<()>;

    /// Apply a verdict to every item of the document with this item number,
    /// returning how many rows matched.
    async fn update_item_feasibility(
        &self,
        document_id: &str,
        item_number: &str,
        feasibility: &ItemFeasibility,
    ) -> Result<usize>;
}
