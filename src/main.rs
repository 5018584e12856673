use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use finq_core::channel::{Channel, CliChannel};
use finq_core::composer::AnswerComposer;
use finq_core::config::Config;
use finq_index::manager::{IndexConfig, IndexManager};
use finq_index::rest::RestBackend;
use finq_index::retriever::{RetrievalConfig, Retriever};
use finq_ingest::filings::FilingsClient;
use finq_ingest::pipeline::{self, IngestConfig};
use finq_ingest::store::FsObjectStore;
use finq_llm::ollama::OllamaProvider;

#[derive(Parser)]
#[command(name = "finq", version, about = "Question answering over SEC filings")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "finq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, chunk and persist filings for the configured tickers.
    Ingest,
    /// Deploy the index and answer questions interactively.
    Chat,
}

fn index_config(config: &Config) -> IndexConfig {
    IndexConfig {
        index_name: config.vector.index_name.clone(),
        endpoint_name: config.vector.endpoint_name.clone(),
        deployed_index_id: config.vector.deployed_index_id.clone(),
        dimensions: config.vector.dimensions,
        approx_neighbor_count: config.vector.approx_neighbor_count,
        upload_batch_size: config.vector.upload_batch_size,
        upload_max_retries: config.vector.upload_max_retries,
        deploy_timeout: Duration::from_secs(config.vector.deploy_timeout_secs),
        manifest_path: config.vector.manifest_path.clone(),
        ..IndexConfig::default()
    }
}

fn ingest_config(config: &Config) -> IngestConfig {
    IngestConfig {
        tickers: config.ingest.tickers.clone(),
        form_type: config.ingest.form_type.clone(),
        filings_per_ticker: config.ingest.filings_per_ticker,
        chunk_size: config.ingest.chunk_size,
        chunk_overlap: config.ingest.chunk_overlap,
        snapshot_path: config.ingest.snapshot_path.clone(),
    }
}

async fn ingest(config: &Config) -> anyhow::Result<()> {
    let client = FilingsClient::new(
        &config.ingest.filings_base_url,
        config.ingest.api_key.clone(),
    );
    let store = FsObjectStore::new(&config.ingest.data_dir);
    let passages = pipeline::run_pipeline(&client, &store, &ingest_config(config)).await?;
    info!(passages = passages.len(), "ingestion finished");
    Ok(())
}

async fn chat(config: &Config) -> anyhow::Result<()> {
    let provider = Arc::new(OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    ));
    provider.health_check().await?;

    let store = FsObjectStore::new(&config.ingest.data_dir);
    let passages = pipeline::load_corpus(&store, &ingest_config(config))?;
    info!(passages = passages.len(), "corpus loaded");

    let backend = Arc::new(RestBackend::new(
        &config.vector.base_url,
        config.vector.api_token.clone(),
    ));
    let manager = IndexManager::new(
        Arc::clone(&backend),
        Arc::clone(&provider),
        index_config(config),
    );
    let handle = manager.deploy(&passages).await?;

    let retriever = Retriever::new(
        backend,
        Arc::clone(&provider),
        handle,
        RetrievalConfig {
            top_k: config.retrieval.top_k,
        },
    );
    let composer = AnswerComposer::new(retriever, provider);

    println!("Ask about the ingested filings ('exit' or 'quit' to leave).");
    let mut channel = CliChannel::new();
    while let Some(message) = channel.recv().await? {
        let answer = composer.answer(&message.text).await;
        channel.send(&answer).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("failed to load configuration")?;
    config.validate()?;

    match cli.command {
        Command::Ingest => ingest(&config).await,
        Command::Chat => chat(&config).await,
    }
}
