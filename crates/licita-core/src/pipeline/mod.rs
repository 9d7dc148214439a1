//! Multi-stage analysis of one notice.
//!
//! [`Orchestrator::run`] drives a document from `analyzing` to `completed`
//! (or `error`):
//!
//! ```text
//! chunk by section -> basic data -> estimated value
//!   -> sliding windows -> items (one call per window, merged)
//!   -> requirements -> feasibility -> executive summary
//! ```
//!
//! Stages run strictly in order and each one sees the outputs of the ones
//! before it. After every generation call a [`StageResult`] is recorded and
//! the stage's writes are applied, so a failed run keeps everything persisted
//! up to the failing stage. Any generation or storage failure aborts the run.

mod effects;
mod progress;
mod types;

pub use progress::{ChannelSink, NoOpSink, ProgressEvent, ProgressSink, ProgressStep};
pub use types::{AnalysisReport, PipelineError};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Value};

use crate::chunker::{chunk_by_section, chunk_full_text, chunks_in_section, Chunk, SectionKind};
use crate::config::{ItemFailurePolicy, PipelineConfig};
use crate::document::{prefix_chars, ExtractedDocument, PAGE_SEPARATOR};
use crate::generation::{Generation, GenerationClient, GenerationRequest};
use crate::merge::KeyedMerge;
use crate::persistence::{
    ChunkPosition, DocumentPatch, DocumentStatus, ItemRow, PersistenceGateway, StageResult,
    INSERT_BATCH_SIZE,
};
use crate::stages::fields::empty_object;
use crate::stages::{
    prompts, BasicData, ChunkItems, EstimatedValue, ExecutiveSummary, ExtractedItem, Feasibility,
    ItemKey, Requirements, Stage,
};
use crate::training::{load_categories, load_stage_hints, TrainingSource};
use progress::ProgressReporter;

/// Header chunks given to the basic-data stage
const HEADER_CHUNKS: usize = 3;
/// Pages used instead when no header chunk exists
const FALLBACK_PAGES: usize = 5;
const VALUE_INPUT_CHARS: usize = 25_000;
const REQUIREMENTS_INPUT_CHARS: usize = 20_000;
/// Items passed as context to the feasibility stage
const FEASIBILITY_ITEMS: usize = 50;
/// Items passed as context to the summary stage
const SUMMARY_ITEMS: usize = 30;

/// Sequences the stages of a run over injected collaborators.
pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    store: Arc<dyn PersistenceGateway>,
    training: Arc<dyn TrainingSource>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        store: Arc<dyn PersistenceGateway>,
        training: Arc<dyn TrainingSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            store,
            training,
            config,
        }
    }

    /// Analyze an extracted document end to end.
    ///
    /// On failure the document is marked `error` with the message, exactly
    /// one terminal error event is emitted and the error is returned.
    pub async fn run(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        sink: &dyn ProgressSink,
    ) -> Result<AnalysisReport, PipelineError> {
        let started = Instant::now();
        let mut progress = ProgressReporter::new(sink, document_id);

        tracing::info!(
            document_id,
            pages = document.total_pages,
            words = document.total_words,
            model = self.client.model_id(),
            "Starting analysis"
        );

        match self.execute(document_id, document, &mut progress, started).await {
            Ok(report) => {
                tracing::info!(
                    document_id,
                    items = report.items.len(),
                    elapsed_ms = report.duration_ms,
                    "Analysis completed"
                );
                Ok(report)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(document_id, error = %message, "Analysis failed");
                if let Err(e) = self
                    .store
                    .set_status(document_id, DocumentStatus::Error, Some(&message))
                    .await
                {
                    tracing::error!(document_id, error = %e, "Failed to record error status");
                }
                progress.failed(&message);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        progress: &mut ProgressReporter<'_>,
        started: Instant,
    ) -> Result<AnalysisReport, PipelineError> {
        self.store
            .set_status(document_id, DocumentStatus::Analyzing, None)
            .await
            .map_err(PipelineError::persistence("document status"))?;

        if document.is_blank() {
            return Err(PipelineError::EmptyDocument {
                document_id: document_id.to_string(),
            });
        }

        progress.emit(
            ProgressStep::Chunking,
            5,
            format!("Chunking {} pages by section", document.total_pages),
        );
        let chunks = chunk_by_section(&document.pages, &self.config.chunking);

        let basic_data = self
            .basic_data_stage(document_id, document, &chunks, progress)
            .await?;
        let estimated_value = self
            .estimated_value_stage(document_id, document, progress)
            .await?;
        let (items, item_windows) = self.items_stage(document_id, document, progress).await?;
        let requirements = self
            .requirements_stage(document_id, document, &chunks, progress)
            .await?;

        let feasibility_context = json!({
            "dados_basicos": &basic_data,
            "valor_estimado": &estimated_value,
            "itens": &items[..items.len().min(FEASIBILITY_ITEMS)],
            "requisitos": &requirements,
        });
        let feasibility = self
            .feasibility_stage(document_id, &feasibility_context, progress)
            .await?;

        let summary_context = json!({
            "dados_basicos": &basic_data,
            "valor_estimado": &estimated_value,
            "itens_resumo": &items[..items.len().min(SUMMARY_ITEMS)],
            "requisitos": &requirements,
            "viabilidade": &feasibility,
        });
        let summary = self
            .summary_stage(document_id, &summary_context, progress)
            .await?;

        let duration_ms = started.elapsed().as_millis() as u64;
        progress.completed(format!(
            "Analysis finished in {}s",
            (duration_ms + 500) / 1000
        ));

        Ok(AnalysisReport {
            document_id: document_id.to_string(),
            basic_data,
            estimated_value,
            items,
            requirements,
            feasibility,
            summary,
            item_windows,
            duration_ms,
        })
    }

    async fn basic_data_stage(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        chunks: &[Chunk],
        progress: &mut ProgressReporter<'_>,
    ) -> Result<BasicData, PipelineError> {
        let stage = Stage::BasicData;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Identifying basic notice data");

        let hints = load_stage_hints(self.training.as_ref(), stage).await;
        let header = chunks_in_section(chunks, SectionKind::Header);
        // Without a header chunk the leading pages count as one input chunk
        let (input, used) = if header.is_empty() {
            let pages = document.pages.iter().take(FALLBACK_PAGES);
            (join_texts(pages.map(|p| p.text.as_str())), 1)
        } else {
            let chunks = header.iter().take(HEADER_CHUNKS);
            (join_texts(chunks.map(|c| c.text.as_str())), header.len().min(HEADER_CHUNKS))
        };

        let json = self
            .single_shot(document_id, stage, prompts::basic_data(&input, &hints), used)
            .await?;
        let data = BasicData::from_json(&json);

        let mut patch = effects::basic_data_patch(&data);
        if let (Some(cnpj), Some(organization)) = (data.organization_cnpj(), &data.organization) {
            let organization_id = self
                .store
                .upsert_organization(cnpj, organization)
                .await
                .map_err(PipelineError::persistence("organization"))?;
            tracing::debug!(document_id, cnpj, organization_id = %organization_id, "Linked organization");
            patch.organization_id = Some(organization_id);
        }
        if !patch.is_empty() {
            self.store
                .update_document(document_id, &patch)
                .await
                .map_err(PipelineError::persistence("basic data"))?;
        }

        progress.emit(ProgressStep::Stage(stage), end, "Basic data extracted");
        Ok(data)
    }

    async fn estimated_value_stage(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<EstimatedValue, PipelineError> {
        let stage = Stage::EstimatedValue;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Looking for the estimated value");

        let hints = load_stage_hints(self.training.as_ref(), stage).await;
        let input = document.leading_text(VALUE_INPUT_CHARS);

        let json = self
            .single_shot(document_id, stage, prompts::estimated_value(input, &hints), 1)
            .await?;
        let value = EstimatedValue::from_json(&json);

        if let Some(total) = value.total {
            let patch = DocumentPatch {
                estimated_value: Some(total),
                ..Default::default()
            };
            self.store
                .update_document(document_id, &patch)
                .await
                .map_err(PipelineError::persistence("estimated value"))?;
        }

        progress.emit(ProgressStep::Stage(stage), end, "Estimated value processed");
        Ok(value)
    }

    /// Scan the whole text window by window, folding items into a
    /// deduplicated list. Item rows are written once the scan is over.
    async fn items_stage(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<(Vec<ExtractedItem>, usize), PipelineError> {
        let stage = Stage::Items;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Extracting items (full scan)");

        let hints = load_stage_hints(self.training.as_ref(), stage).await;
        let categories = load_categories(self.training.as_ref()).await;
        let windows = chunk_full_text(
            &document.full_text,
            self.config.chunking.item_window_chars,
            self.config.chunking.item_overlap_chars,
        );
        let total = windows.len();

        let mut merged: KeyedMerge<ItemKey, ExtractedItem> = KeyedMerge::new();
        let mut duration_ms = 0;

        for window in &windows {
            let span = usize::from(end - start);
            let percent = start + (window.index * span / total) as u8;
            progress.emit(
                ProgressStep::Stage(stage),
                percent,
                format!("Extracting items (block {}/{})", window.index + 1, total),
            );

            let prompt = prompts::items(&window.text, window.index, total, &categories, &hints);
            let generation = match self.generate(stage, prompt).await {
                Ok(generation) => generation,
                Err(err) => {
                    if self.config.item_failure_policy == ItemFailurePolicy::PersistPartial {
                        let partial = merged.items();
                        tracing::warn!(
                            document_id,
                            chunk = window.index,
                            items = partial.len(),
                            "Item scan failed, keeping items merged so far"
                        );
                        if let Err(e) = self
                            .commit_items(document_id, partial, window.index, duration_ms, false)
                            .await
                        {
                            tracing::error!(document_id, error = %e, "Failed to keep partial items");
                        }
                    }
                    return Err(err);
                }
            };
            duration_ms += generation.duration_ms;

            let (json, succeeded) = response_json(document_id, stage, &generation);
            self.record(
                document_id,
                StageResult {
                    stage,
                    model: self.client.model_id().to_string(),
                    prompt_version: stage.prompt_version().to_string(),
                    input_chunk_count: 1,
                    json: json.clone(),
                    duration_ms: generation.duration_ms,
                    succeeded,
                    chunk: Some(ChunkPosition {
                        index: window.index,
                        total,
                    }),
                },
            )
            .await?;

            let found = ChunkItems::from_json(&json).items;
            let found_count = found.len();
            let added = merged.extend_by(found, ExtractedItem::identity_key);
            tracing::debug!(
                document_id,
                chunk = window.index,
                found = found_count,
                added,
                "Item window processed"
            );
        }

        self.commit_items(document_id, merged.items(), total, duration_ms, true)
            .await?;

        progress.emit(
            ProgressStep::Stage(stage),
            end,
            format!("{} items extracted", merged.len()),
        );
        Ok((merged.into_items(), total))
    }

    /// Record the aggregate item result and insert the item rows.
    async fn commit_items(
        &self,
        document_id: &str,
        items: &[ExtractedItem],
        windows: usize,
        duration_ms: u64,
        complete: bool,
    ) -> Result<(), PipelineError> {
        let stage = Stage::Items;
        self.record(
            document_id,
            StageResult {
                stage,
                model: self.client.model_id().to_string(),
                prompt_version: stage.prompt_version().to_string(),
                input_chunk_count: windows,
                json: json!({ "itens": items, "total": items.len() }),
                duration_ms,
                succeeded: complete,
                chunk: None,
            },
        )
        .await?;

        let rows: Vec<ItemRow> = items.iter().map(effects::item_row).collect();
        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            self.store
                .insert_items(document_id, batch)
                .await
                .map_err(PipelineError::persistence("items"))?;
        }
        Ok(())
    }

    async fn requirements_stage(
        &self,
        document_id: &str,
        document: &ExtractedDocument,
        chunks: &[Chunk],
        progress: &mut ProgressReporter<'_>,
    ) -> Result<Requirements, PipelineError> {
        let stage = Stage::Requirements;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Mapping requirements and qualification");

        let hints = load_stage_hints(self.training.as_ref(), stage).await;
        let eligibility = chunks_in_section(chunks, SectionKind::Eligibility);
        let joined;
        let input = if eligibility.is_empty() {
            document.leading_text(REQUIREMENTS_INPUT_CHARS)
        } else {
            joined = join_texts(eligibility.iter().map(|c| c.text.as_str()));
            prefix_chars(&joined, REQUIREMENTS_INPUT_CHARS)
        };

        let json = self
            .single_shot(
                document_id,
                stage,
                prompts::requirements(input, &hints),
                eligibility.len().max(1),
            )
            .await?;
        let requirements = Requirements::from_json(&json);

        let certifications = effects::certification_rows(&requirements);
        for batch in certifications.chunks(INSERT_BATCH_SIZE) {
            self.store
                .insert_certifications(document_id, batch)
                .await
                .map_err(PipelineError::persistence("certifications"))?;
        }
        let rows = effects::requirement_rows(&requirements);
        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            self.store
                .insert_requirements(document_id, batch)
                .await
                .map_err(PipelineError::persistence("requirements"))?;
        }

        progress.emit(
            ProgressStep::Stage(stage),
            end,
            format!(
                "{} requirements and {} certifications mapped",
                rows.len(),
                certifications.len()
            ),
        );
        Ok(requirements)
    }

    async fn feasibility_stage(
        &self,
        document_id: &str,
        context: &Value,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<Feasibility, PipelineError> {
        let stage = Stage::Feasibility;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Assessing bid feasibility");

        let json = self
            .single_shot(document_id, stage, prompts::feasibility(context), 0)
            .await?;
        let feasibility = Feasibility::from_json(&json);

        let patch = effects::feasibility_patch(&feasibility);
        if !patch.is_empty() {
            self.store
                .update_document(document_id, &patch)
                .await
                .map_err(PipelineError::persistence("feasibility"))?;
        }

        for analysis in &feasibility.items {
            let Some(item_number) = analysis.item_number.as_deref() else {
                continue;
            };
            let matched = self
                .store
                .update_item_feasibility(document_id, item_number, &effects::item_feasibility(analysis))
                .await
                .map_err(PipelineError::persistence("item feasibility"))?;
            if matched == 0 {
                tracing::debug!(document_id, item_number, "No stored item for feasibility analysis");
            }
        }

        progress.emit(ProgressStep::Stage(stage), end, "Feasibility assessed");
        Ok(feasibility)
    }

    async fn summary_stage(
        &self,
        document_id: &str,
        context: &Value,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<ExecutiveSummary, PipelineError> {
        let stage = Stage::Summary;
        let (start, end) = stage.band();
        progress.emit(ProgressStep::Stage(stage), start, "Writing executive summary");

        let json = self
            .single_shot(document_id, stage, prompts::summary(context), 0)
            .await?;
        let summary = ExecutiveSummary::from_json(&json);

        let patch = DocumentPatch {
            executive_summary: summary.summary.clone(),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        self.store
            .update_document(document_id, &patch)
            .await
            .map_err(PipelineError::persistence("executive summary"))?;
        self.store
            .set_status(document_id, DocumentStatus::Completed, None)
            .await
            .map_err(PipelineError::persistence("document status"))?;

        progress.emit(ProgressStep::Stage(stage), end, "Executive summary ready");
        Ok(summary)
    }

    /// One generation call plus its audit record. Returns the parsed JSON,
    /// or an empty object when the response held none.
    async fn single_shot(
        &self,
        document_id: &str,
        stage: Stage,
        prompt: String,
        input_chunk_count: usize,
    ) -> Result<Value, PipelineError> {
        let generation = self.generate(stage, prompt).await?;
        let (json, succeeded) = response_json(document_id, stage, &generation);

        self.record(
            document_id,
            StageResult {
                stage,
                model: self.client.model_id().to_string(),
                prompt_version: stage.prompt_version().to_string(),
                input_chunk_count,
                json: json.clone(),
                duration_ms: generation.duration_ms,
                succeeded,
                chunk: None,
            },
        )
        .await?;

        tracing::info!(
            document_id,
            stage = %stage,
            elapsed_ms = generation.duration_ms,
            tokens_in = generation.tokens_in,
            tokens_out = generation.tokens_out,
            "Stage complete"
        );
        Ok(json)
    }

    async fn generate(&self, stage: Stage, prompt: String) -> Result<Generation, PipelineError> {
        let request = GenerationRequest::new(prompt)
            .with_system(prompts::system_prompt(stage))
            .with_temperature(stage.temperature());
        self.client
            .generate(request)
            .await
            .map_err(|source| PipelineError::Generation { stage, source })
    }

    async fn record(&self, document_id: &str, result: StageResult) -> Result<(), PipelineError> {
        self.store
            .record_stage(document_id, &result)
            .await
            .map_err(PipelineError::persistence("stage result"))
    }
}

/// Parsed JSON of a response, falling back to an empty object. The flag is
/// false when the fallback was used.
fn response_json(document_id: &str, stage: Stage, generation: &Generation) -> (Value, bool) {
    match &generation.json {
        Some(json) => (json.clone(), true),
        None => {
            tracing::warn!(
                document_id,
                stage = %stage,
                chars = generation.text.len(),
                "Response held no JSON object, using defaults"
            );
            (empty_object(), false)
        }
    }
}

fn join_texts<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    texts.collect::<Vec<_>>().join(PAGE_SEPARATOR)
}
