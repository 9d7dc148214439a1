//! The six analysis stages: typed outputs and prompt builders.
//!
//! Every stage turns model JSON into a typed value through a `from_json`
//! constructor that never fails. Missing or malformed fields become `None`
//! or empty collections. Serialized outputs use the same Portuguese keys the
//! prompts ask the model for, so stage records read like the raw responses.

pub mod fields;
mod analysis;
mod basic;
mod items;
pub mod prompts;
mod requirements;

pub use analysis::{
    ExecutiveSummary, Feasibility, ItemAnalysis, KeyData, NextAction, Opportunity,
};
pub use basic::{BasicData, EstimatedValue, LotValue, Organization};
pub use items::{ChunkItems, ExtractedItem, ItemKey};
pub use requirements::{
    Certification, Difficulty, Requirement, RequirementCategory, Requirements,
};

use serde::{Deserialize, Serialize};

/// Analysis stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "dados_basicos")]
    BasicData,
    #[serde(rename = "valor_estimado")]
    EstimatedValue,
    #[serde(rename = "itens_completos")]
    Items,
    #[serde(rename = "requisitos_tecnicos")]
    Requirements,
    #[serde(rename = "viabilidade")]
    Feasibility,
    #[serde(rename = "resumo_executivo")]
    Summary,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::BasicData,
        Stage::EstimatedValue,
        Stage::Items,
        Stage::Requirements,
        Stage::Feasibility,
        Stage::Summary,
    ];

    /// Wire name used in stage records and progress events
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BasicData => "dados_basicos",
            Stage::EstimatedValue => "valor_estimado",
            Stage::Items => "itens_completos",
            Stage::Requirements => "requisitos_tecnicos",
            Stage::Feasibility => "viabilidade",
            Stage::Summary => "resumo_executivo",
        }
    }

    /// Progress range covered by the stage: emitted at start and completion.
    pub fn band(&self) -> (u8, u8) {
        match self {
            Stage::BasicData => (10, 18),
            Stage::EstimatedValue => (18, 25),
            Stage::Items => (25, 45),
            Stage::Requirements => (45, 70),
            Stage::Feasibility => (70, 88),
            Stage::Summary => (88, 100),
        }
    }

    /// Extraction stages run colder than the analytical ones.
    pub fn temperature(&self) -> f32 {
        match self {
            Stage::BasicData | Stage::EstimatedValue | Stage::Items => 0.05,
            Stage::Requirements | Stage::Feasibility | Stage::Summary => 0.1,
        }
    }

    pub fn prompt_version(&self) -> &'static str {
        prompts::version(*self)
    }

    /// Whether few-shot examples are loaded for this stage.
    pub fn uses_examples(&self) -> bool {
        matches!(
            self,
            Stage::BasicData | Stage::Items | Stage::Requirements
        )
    }

    /// Whether training rules are loaded for this stage.
    pub fn uses_rules(&self) -> bool {
        !matches!(self, Stage::Feasibility | Stage::Summary)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
