use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FINQ_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("FINQ_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("FINQ_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_BASE_URL") {
            self.vector.base_url = v;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_API_TOKEN") {
            self.vector.api_token = Some(v);
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_INDEX_NAME") {
            self.vector.index_name = v;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_ENDPOINT_NAME") {
            self.vector.endpoint_name = v;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_DIMENSIONS")
            && let Ok(dimensions) = v.parse::<u32>()
        {
            self.vector.dimensions = dimensions;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_BATCH_SIZE")
            && let Ok(batch_size) = v.parse::<usize>()
        {
            self.vector.upload_batch_size = batch_size;
        }
        if let Ok(v) = std::env::var("FINQ_VECTOR_DEPLOY_TIMEOUT_SECS")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.vector.deploy_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("FINQ_RETRIEVAL_TOP_K")
            && let Ok(top_k) = v.parse::<usize>()
        {
            self.retrieval.top_k = top_k;
        }
        if let Ok(v) = std::env::var("FINQ_INGEST_BASE_URL") {
            self.ingest.filings_base_url = v;
        }
        if let Ok(v) = std::env::var("FINQ_INGEST_API_KEY") {
            self.ingest.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("FINQ_INGEST_TICKERS") {
            self.ingest.tickers = v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("FINQ_INGEST_DATA_DIR") {
            self.ingest.data_dir = v.into();
        }
        if let Ok(v) = std::env::var("FINQ_INGEST_SNAPSHOT_PATH") {
            self.ingest.snapshot_path = v.into();
        }
    }
}
