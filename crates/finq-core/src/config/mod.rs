mod env;
mod types;


pub use types::*;

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file with `FINQ_*` env overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            toml::from_str::<Self>(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Fail-fast validation, run once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));
        if self.llm.base_url.is_empty() {
            return invalid("llm.base_url must not be empty");
        }
        if self.llm.model.is_empty() {
            return invalid("llm.model must not be empty");
        }
        if self.llm.embedding_model.is_empty() {
            return invalid("llm.embedding_model must not be empty");
        }
        if self.vector.base_url.is_empty() {
            return invalid("vector.base_url must not be empty");
        }
        if self.vector.index_name.is_empty() {
            return invalid("vector.index_name must not be empty");
        }
        if self.vector.endpoint_name.is_empty() {
            return invalid("vector.endpoint_name must not be empty");
        }
        if self.vector.dimensions == 0 {
            return invalid("vector.dimensions must be nonzero");
        }
        if self.vector.upload_batch_size == 0 {
            return invalid("vector.upload_batch_size must be nonzero");
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be nonzero");
        }
        if self.ingest.chunk_size == 0 {
            return invalid("ingest.chunk_size must be nonzero");
        }
        Ok(())
    }
}
