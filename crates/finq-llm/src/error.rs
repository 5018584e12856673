#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
