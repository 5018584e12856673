use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("llm error: {0}")]
    Llm(#[from] finq_llm::LlmError),

    #[error("found multiple {kind} resources named '{name}', refusing to pick one")]
    Ambiguous { kind: &'static str, name: String },

    #[error("deployment of '{deployed_index_id}' did not complete within {timeout_secs}s")]
    DeployTimeout {
        deployed_index_id: String,
        timeout_secs: u64,
    },

    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: u32, actual: usize },

    #[error("upload of batch {batch} failed: {source}")]
    Upload {
        batch: usize,
        source: BackendError,
    },

    #[error("index contains no datapoints")]
    EmptyIndex,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
