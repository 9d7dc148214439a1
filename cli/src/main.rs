use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use licita_core::chunker::{chunk_by_section, chunk_full_text};
use licita_core::generation::model_matches;
use licita_core::pdf::extract_pages;
use licita_core::{
    ChannelSink, Config, DocumentStatus, ExtractedDocument, FileTraining, MemoryStore,
    NoTraining, OllamaClient, Orchestrator, PersistenceGateway, TrainingSource,
};

#[derive(Parser, Debug)]
#[command(name = "licita")]
#[command(about = "Structured extraction for Brazilian procurement notices")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full analysis of a notice PDF, printing progress as JSON lines
    Analyze {
        pdf: PathBuf,
        /// Write the store snapshot here instead of the data directory
        #[arg(long)]
        output: Option<PathBuf>,
        /// Training-hint file (overrides LICITA_TRAINING_FILE)
        #[arg(long)]
        training: Option<PathBuf>,
    },
    /// Show how a notice PDF is chunked, without calling the model
    Chunks { pdf: PathBuf },
    /// Check that Ollama is reachable and the configured model is installed
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("licita=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Analyze {
            pdf,
            output,
            training,
        } => analyze(config, &pdf, output.as_deref(), training).await,
        Command::Chunks { pdf } => chunks(&config, &pdf).await,
        Command::Health => health(&config).await,
    }
}

async fn extract(pdf: &Path) -> Result<ExtractedDocument> {
    let path = pdf.to_path_buf();
    tokio::task::spawn_blocking(move || extract_pages(&path))
        .await
        .context("PDF extraction task panicked")?
        .with_context(|| format!("Failed to extract {}", pdf.display()))
}

async fn analyze(
    config: Config,
    pdf: &Path,
    output: Option<&Path>,
    training: Option<PathBuf>,
) -> Result<()> {
    let training: Arc<dyn TrainingSource> = match training.or(config.training_file.clone()) {
        Some(path) => Arc::new(FileTraining::load(&path)?),
        None => Arc::new(NoTraining),
    };

    let client = Arc::new(OllamaClient::new(config.ollama.clone()));
    if !client.health_check().await {
        tracing::warn!(
            url = %config.ollama.base_url,
            model = %config.ollama.model,
            "Model not available, generation calls will likely fail"
        );
    }

    let store = Arc::new(MemoryStore::new());
    let title = pdf.file_name().map(|name| name.to_string_lossy());
    let document_id = store.create_document(title.as_deref()).await;

    store
        .set_status(&document_id, DocumentStatus::Extracting, None)
        .await?;
    let document = match extract(pdf).await {
        Ok(document) => document,
        Err(e) => {
            store
                .set_status(&document_id, DocumentStatus::Error, Some(&format!("{e:#}")))
                .await?;
            return Err(e);
        }
    };
    tracing::info!(
        document_id = %document_id,
        pages = document.total_pages,
        words = document.total_words,
        "Extracted notice text"
    );

    let (sink, mut events) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize progress event"),
            }
        }
    });

    let orchestrator = Orchestrator::new(client, store.clone(), training, config.pipeline());
    let result = orchestrator.run(&document_id, &document, &sink).await;
    drop(sink);
    printer.await.context("Progress printer panicked")?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            config
                .ensure_dirs()
                .context("Failed to create data directories")?;
            config.snapshot_path(&document_id)
        }
    };
    let snapshot = store.snapshot().await;
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Wrote store snapshot");

    let report = result?;
    tracing::info!(
        document_id = %report.document_id,
        items = report.items.len(),
        requirements = report.requirements.requirements.len(),
        verdict = report.feasibility.verdict.as_deref().unwrap_or("-"),
        "Analysis done"
    );
    Ok(())
}

async fn chunks(config: &Config, pdf: &Path) -> Result<()> {
    let document = extract(pdf).await?;

    for chunk in chunk_by_section(&document.pages, &config.chunking) {
        println!(
            "{}",
            serde_json::json!({
                "index": chunk.index,
                "section": chunk.section,
                "page_start": chunk.page_start,
                "page_end": chunk.page_end,
                "chars": chunk.char_count(),
            })
        );
    }

    let windows = chunk_full_text(
        &document.full_text,
        config.chunking.item_window_chars,
        config.chunking.item_overlap_chars,
    );
    tracing::info!(
        pages = document.total_pages,
        item_windows = windows.len(),
        "Chunked notice"
    );
    Ok(())
}

async fn health(config: &Config) -> Result<()> {
    let client = OllamaClient::new(config.ollama.clone());
    let models = client.list_models().await?;

    if model_matches(&models, &config.ollama.model) {
        println!("ok: {} is available at {}", config.ollama.model, config.ollama.base_url);
        Ok(())
    } else {
        anyhow::bail!(
            "model {} not installed at {} (found: {})",
            config.ollama.model,
            config.ollama.base_url,
            models.join(", ")
        )
    }
}
