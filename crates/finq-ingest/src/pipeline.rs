//! End-to-end ingestion: fetch filings, extract, chunk and persist.

use std::path::PathBuf;

use tracing::{info, warn};

use finq_index::Passage;

use crate::error::IngestError;
use crate::extract::extract_text;
use crate::filings::FilingsClient;
use crate::splitter::{SplitterConfig, TextSplitter};
use crate::store::{ObjectStore, PassageMeta, Snapshot};

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub tickers: Vec<String>,
    pub form_type: String,
    pub filings_per_ticker: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub snapshot_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "MSFT", "GOOG", "AMZN", "META"]
                .map(String::from)
                .to_vec(),
            form_type: "10-K".into(),
            filings_per_ticker: 5,
            chunk_size: 500,
            chunk_overlap: 20,
            snapshot_path: PathBuf::from(".finq/snapshot.json"),
        }
    }
}

fn to_passage(chunk: String, meta: &PassageMeta) -> Passage {
    Passage {
        text: chunk,
        source_id: meta.company_name.clone(),
        filed_at: meta.filed_at,
        source_url: meta.filing_url.clone(),
        chunk_index: meta.chunk_index,
    }
}

/// Load a previously ingested corpus: the snapshot when present, otherwise
/// whatever the object store holds.
///
/// # Errors
///
/// Returns an error if the snapshot or the store cannot be read.
pub fn load_corpus<S: ObjectStore>(
    store: &S,
    config: &IngestConfig,
) -> Result<Vec<Passage>, IngestError> {
    if let Some(snapshot) = Snapshot::load(&config.snapshot_path)? {
        info!(chunks = snapshot.chunks.len(), "loaded corpus from snapshot");
        return Ok(snapshot
            .chunks
            .into_iter()
            .zip(&snapshot.metadata)
            .map(|(chunk, meta)| to_passage(chunk, meta))
            .collect());
    }
    let entries = store.list()?;
    info!(chunks = entries.len(), "loaded corpus from object store");
    Ok(entries
        .into_iter()
        .map(|(chunk, meta)| to_passage(chunk, &meta))
        .collect())
}

/// Fetch, extract, chunk and persist filings for the configured tickers.
/// An existing snapshot short-circuits the whole run. A failing ticker
/// contributes zero filings; a filing that cannot be fetched or yields no
/// text is skipped.
///
/// # Errors
///
/// Returns an error if a chunk or the snapshot cannot be persisted.
pub async fn run_pipeline<S: ObjectStore>(
    client: &FilingsClient,
    store: &S,
    config: &IngestConfig,
) -> Result<Vec<Passage>, IngestError> {
    if let Some(snapshot) = Snapshot::load(&config.snapshot_path)? {
        info!(chunks = snapshot.chunks.len(), "snapshot present, skipping ingestion");
        return Ok(snapshot
            .chunks
            .into_iter()
            .zip(&snapshot.metadata)
            .map(|(chunk, meta)| to_passage(chunk, meta))
            .collect());
    }

    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
    });
    let mut chunks = Vec::new();
    let mut metadata = Vec::new();

    for ticker in &config.tickers {
        let filings = match client
            .latest_filings(ticker, &config.form_type, config.filings_per_ticker)
            .await
        {
            Ok(filings) => filings,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "failed to fetch filings, skipping ticker");
                continue;
            }
        };
        info!(ticker = %ticker, count = filings.len(), "processing filings");

        for filing in filings {
            let html = match client.fetch_filing(&filing.link_to_filing_details).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(url = %filing.link_to_filing_details, error = %e, "failed to fetch filing, skipping");
                    continue;
                }
            };
            let Some(text) = extract_text(&html) else {
                warn!(url = %filing.link_to_filing_details, "filing yielded no text, skipping");
                continue;
            };

            for (chunk_index, chunk) in splitter.split(&text).into_iter().enumerate() {
                let meta = PassageMeta {
                    company_name: filing.company_name.clone(),
                    filed_at: filing.filed_at,
                    filing_url: filing.link_to_filing_details.clone(),
                    chunk_index,
                };
                let path = format!(
                    "{}/chunks/{}_{chunk_index}.txt",
                    meta.company_name,
                    meta.filed_at.format("%Y-%m-%dT%H-%M-%S"),
                );
                store.put(&path, &chunk, &meta)?;
                chunks.push(chunk);
                metadata.push(meta);
            }
        }
    }

    let snapshot = Snapshot {
        chunks: chunks.clone(),
        metadata: metadata.clone(),
    };
    snapshot.save(&config.snapshot_path)?;
    info!(chunks = chunks.len(), "ingestion complete");

    Ok(chunks
        .into_iter()
        .zip(&metadata)
        .map(|(chunk, meta)| to_passage(chunk, meta))
        .collect())
}
