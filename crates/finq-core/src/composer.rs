//! Turns a question into a user-facing answer.

use std::sync::Arc;

use tracing::warn;

use finq_index::IndexError;
use finq_index::backend::IndexBackend;
use finq_index::retriever::Retriever;
use finq_llm::LlmProvider;

pub const NO_CONTEXT_MESSAGE: &str =
    "Sorry, I couldn't find any relevant information for your query.";
pub const RETRIEVAL_ERROR_MESSAGE: &str =
    "An error occurred while searching the filings. Please try again.";
pub const GENERATION_ERROR_MESSAGE: &str =
    "An error occurred while generating the answer. Please try again.";

const PROMPT_TEMPLATE: &str = "Provide a concise and specific answer using the references below:

Question: {question}

References:
{context}

Answer:";

/// Answers questions by retrieving passages and prompting the generator.
/// Infallible by contract: every failure maps to a fixed user-facing
/// message so the session loop never dies on a single question.
/// Stateless across calls.
pub struct AnswerComposer<B, P> {
    retriever: Retriever<B, P>,
    provider: Arc<P>,
}

impl<B: IndexBackend, P: LlmProvider> AnswerComposer<B, P> {
    pub fn new(retriever: Retriever<B, P>, provider: Arc<P>) -> Self {
        Self {
            retriever,
            provider,
        }
    }

    pub async fn answer(&self, question: &str) -> String {
        let passages = match self.retriever.search(question).await {
            Ok(passages) => passages,
            Err(IndexError::EmptyIndex) => return NO_CONTEXT_MESSAGE.to_owned(),
            Err(e) => {
                warn!(error = %e, "retrieval failed");
                return RETRIEVAL_ERROR_MESSAGE.to_owned();
            }
        };
        if passages.is_empty() {
            return NO_CONTEXT_MESSAGE.to_owned();
        }

        // Most relevant passage first; generation models weight early
        // context more heavily.
        let context = passages
            .iter()
            .map(|p| p.passage.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = PROMPT_TEMPLATE
            .replace("{question}", question)
            .replace("{context}", &context);

        match self.provider.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation failed");
                GENERATION_ERROR_MESSAGE.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use finq_index::Passage;
    use finq_index::manager::{IndexConfig, IndexManager};
    use finq_index::mock::InMemoryBackend;
    use finq_index::retriever::RetrievalConfig;
    use finq_llm::mock::MockProvider;
    use tempfile::TempDir;

    fn passage(text: &str, chunk_index: usize) -> Passage {
        Passage {
            text: text.into(),
            source_id: "ACME".into(),
            filed_at: Utc.with_ymd_and_hms(2023, 10, 27, 0, 0, 0).unwrap(),
            source_url: "https://example.com".into(),
            chunk_index,
        }
    }

    async fn composer_over(
        dir: &TempDir,
        provider: Arc<MockProvider>,
        corpus: &[Passage],
    ) -> AnswerComposer<InMemoryBackend, MockProvider> {
        let backend = Arc::new(InMemoryBackend::new());
        let config = IndexConfig {
            dimensions: 3,
            manifest_path: dir.path().join("manifest.json"),
            ..IndexConfig::default()
        };
        let handle = IndexManager::new(Arc::clone(&backend), Arc::clone(&provider), config)
            .deploy(corpus)
            .await
            .unwrap();
        let retriever = Retriever::new(
            backend,
            Arc::clone(&provider),
            handle,
            RetrievalConfig::default(),
        );
        AnswerComposer::new(retriever, provider)
    }

    fn revenue_provider() -> Arc<MockProvider> {
        Arc::new(
            MockProvider::default()
                .with_embedding("Revenue grew 10%", vec![1.0, 0.0, 0.0])
                .with_embedding("Net income declined", vec![0.0, 1.0, 0.0])
                .with_embedding("Cash reserves stable", vec![0.0, 0.0, 1.0])
                .with_embedding("How did revenue change?", vec![0.9, 0.1, 0.0]),
        )
    }

    fn revenue_corpus() -> Vec<Passage> {
        vec![
            passage("Revenue grew 10%", 0),
            passage("Net income declined", 1),
            passage("Cash reserves stable", 2),
        ]
    }

    #[tokio::test]
    async fn empty_index_returns_fixed_message_without_generating() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::default().with_default_embedding(vec![0.1, 0.2, 0.3]));
        let composer = composer_over(&dir, Arc::clone(&provider), &[]).await;

        let answer = composer.answer("anything?").await;
        assert_eq!(answer, NO_CONTEXT_MESSAGE);
        assert_eq!(provider.generate_calls(), 0);
    }

    #[tokio::test]
    async fn successful_generation_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let provider = revenue_provider();
        let composer = composer_over(&dir, Arc::clone(&provider), &revenue_corpus()).await;

        let answer = composer.answer("How did revenue change?").await;
        assert_eq!(answer, "mock response");
    }

    #[tokio::test]
    async fn prompt_contains_question_and_top_passage() {
        let dir = tempfile::tempdir().unwrap();
        let provider = revenue_provider();
        let composer = composer_over(&dir, Arc::clone(&provider), &revenue_corpus()).await;

        composer.answer("How did revenue change?").await;

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("How did revenue change?"));
        assert!(prompts[0].contains("Revenue grew 10%"));
        assert!(prompts[0].starts_with("Provide a concise and specific answer"));
    }

    #[tokio::test]
    async fn most_relevant_passage_comes_first_in_context() {
        let dir = tempfile::tempdir().unwrap();
        let provider = revenue_provider();
        let composer = composer_over(&dir, Arc::clone(&provider), &revenue_corpus()).await;

        composer.answer("How did revenue change?").await;

        let prompt = provider.prompts().remove(0);
        let revenue_pos = prompt.find("Revenue grew 10%").unwrap();
        let income_pos = prompt.find("Net income declined").unwrap();
        assert!(revenue_pos < income_pos);
    }

    #[tokio::test]
    async fn generation_failure_maps_to_fixed_message() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(
            MockProvider::failing().with_default_embedding(vec![0.1, 0.2, 0.3]),
        );
        let composer = composer_over(&dir, Arc::clone(&provider), &[passage("text", 0)]).await;

        let answer = composer.answer("q").await;
        assert_eq!(answer, GENERATION_ERROR_MESSAGE);
        assert_eq!(provider.generate_calls(), 1);
    }

    #[tokio::test]
    async fn retrieval_failure_maps_to_fixed_message() {
        let broken = Arc::new(MockProvider::failing_embed());
        let backend = Arc::new(InMemoryBackend::new());
        let handle = finq_index::RetrievalHandle {
            endpoint_id: "ep-1".into(),
            deployed_index_id: "dep".into(),
            dimensions: 3,
            datapoint_count: 1,
        };
        let retriever =
            Retriever::new(backend, Arc::clone(&broken), handle, RetrievalConfig::default());
        let composer = AnswerComposer::new(retriever, Arc::clone(&broken));

        let answer = composer.answer("q").await;
        assert_eq!(answer, RETRIEVAL_ERROR_MESSAGE);
        assert_eq!(broken.generate_calls(), 0);
    }
}
