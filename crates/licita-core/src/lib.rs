//! Licita Core - Extraction pipeline for public-procurement notices
//!
//! This crate turns the text of a procurement notice (edital) into structured
//! records, including:
//! - PDF text extraction per page (lopdf)
//! - Section-aware and sliding-window chunking
//! - Text generation against a local Ollama server
//! - The six-stage analysis orchestrator with progress events
//! - A persistence gateway with an in-memory implementation
//! - Operator-curated training hints for prompts

pub mod chunker;
pub mod config;
pub mod document;
pub mod generation;
pub mod merge;
pub mod pdf;
pub mod persistence;
pub mod pipeline;
pub mod stages;
pub mod training;

pub use config::{ChunkingConfig, Config, ItemFailurePolicy, PipelineConfig};
pub use document::{ExtractedDocument, Page};
pub use generation::{GenerationClient, OllamaClient};
pub use persistence::{DocumentStatus, MemoryStore, PersistenceGateway};
pub use pipeline::{
    AnalysisReport, ChannelSink, NoOpSink, Orchestrator, PipelineError, ProgressEvent,
    ProgressSink, ProgressStep,
};
pub use stages::Stage;
pub use training::{FileTraining, NoTraining, TrainingSource};
