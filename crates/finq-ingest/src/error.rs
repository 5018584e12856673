#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("http error: {0}")]
    Http(String),

    #[error("filings api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
