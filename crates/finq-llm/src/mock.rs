//! Test-only mock LLM provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::LlmProvider;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub default_embedding: Vec<f32>,
    embeddings: Arc<Mutex<HashMap<String, Vec<f32>>>>,
    pub fail_generate: bool,
    pub fail_embed: bool,
    generate_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            default_embedding: vec![0.0; 768],
            embeddings: Arc::new(Mutex::new(HashMap::new())),
            fail_generate: false,
            fail_embed: false,
            generate_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_generate: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embed() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    /// Fix the embedding returned for texts without a registered vector.
    #[must_use]
    pub fn with_default_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.default_embedding = embedding;
        self
    }

    /// Register a per-text embedding, overriding the default for that text.
    #[must_use]
    pub fn with_embedding(self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings
            .lock()
            .unwrap()
            .insert(text.to_owned(), embedding);
        self
    }

    #[must_use]
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Prompts passed to `generate`, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if self.fail_generate {
            return Err(LlmError::Generation("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(LlmError::Embedding("mock embed error".into()));
        }
        let map = self.embeddings.lock().unwrap();
        Ok(map.get(text).cloned().unwrap_or_else(|| {
            self.default_embedding.clone()
        }))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
