use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_llm_model() -> String {
    "llama3.2".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub base_url: String,
    /// Set via `FINQ_VECTOR_API_TOKEN` only, never from the file.
    #[serde(skip)]
    pub api_token: Option<String>,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_endpoint_name")]
    pub endpoint_name: String,
    #[serde(default = "default_deployed_index_id")]
    pub deployed_index_id: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
    #[serde(default = "default_approx_neighbor_count")]
    pub approx_neighbor_count: u32,
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: usize,
    #[serde(default = "default_upload_max_retries")]
    pub upload_max_retries: u32,
    #[serde(default = "default_deploy_timeout_secs")]
    pub deploy_timeout_secs: u64,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: None,
            index_name: default_index_name(),
            endpoint_name: default_endpoint_name(),
            deployed_index_id: default_deployed_index_id(),
            dimensions: default_dimensions(),
            approx_neighbor_count: default_approx_neighbor_count(),
            upload_batch_size: default_upload_batch_size(),
            upload_max_retries: default_upload_max_retries(),
            deploy_timeout_secs: default_deploy_timeout_secs(),
            manifest_path: default_manifest_path(),
        }
    }
}

fn default_index_name() -> String {
    "finq-filings".into()
}

fn default_endpoint_name() -> String {
    "finq-filings-endpoint".into()
}

fn default_deployed_index_id() -> String {
    "finq_deployed_index".into()
}

fn default_dimensions() -> u32 {
    768
}

fn default_approx_neighbor_count() -> u32 {
    150
}

fn default_upload_batch_size() -> usize {
    5000
}

fn default_upload_max_retries() -> u32 {
    3
}

fn default_deploy_timeout_secs() -> u64 {
    600
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from(".finq/upload-manifest.json")
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_filings_base_url")]
    pub filings_base_url: String,
    /// Set via `FINQ_INGEST_API_KEY` only, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    #[serde(default = "default_form_type")]
    pub form_type: String,
    #[serde(default = "default_filings_per_ticker")]
    pub filings_per_ticker: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            filings_base_url: default_filings_base_url(),
            api_key: None,
            tickers: default_tickers(),
            form_type: default_form_type(),
            filings_per_ticker: default_filings_per_ticker(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            data_dir: default_data_dir(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn default_filings_base_url() -> String {
    "https://api.sec-api.io".into()
}

fn default_tickers() -> Vec<String> {
    ["AAPL", "MSFT", "GOOG", "AMZN", "META"]
        .map(String::from)
        .to_vec()
}

fn default_form_type() -> String {
    "10-K".into()
}

fn default_filings_per_ticker() -> usize {
    5
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    20
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".finq/data")
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".finq/snapshot.json")
}
