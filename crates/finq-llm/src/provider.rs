use crate::error::LlmError;

pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed text into a fixed-dimension vector.
    ///
    /// The same provider must be used for both index-time and query-time
    /// embeddings so the two share an embedding space.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or does not support embeddings.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}
