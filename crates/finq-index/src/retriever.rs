//! Nearest-neighbor search over the deployed index.

use std::sync::Arc;

use tracing::debug;

use finq_llm::LlmProvider;

use crate::backend::IndexBackend;
use crate::error::IndexError;
use crate::types::{Passage, RetrievalHandle};

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// A passage returned from a search, with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Embeds queries and fetches the closest passages from the deployed index.
pub struct Retriever<B, P> {
    backend: Arc<B>,
    provider: Arc<P>,
    handle: RetrievalHandle,
    config: RetrievalConfig,
}

impl<B: IndexBackend, P: LlmProvider> Retriever<B, P> {
    pub fn new(
        backend: Arc<B>,
        provider: Arc<P>,
        handle: RetrievalHandle,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            backend,
            provider,
            handle,
            config,
        }
    }

    /// Search with the configured `top_k`.
    ///
    /// # Errors
    ///
    /// See [`Retriever::search_top`].
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredPassage>, IndexError> {
        self.search_top(query, self.config.top_k).await
    }

    /// Return up to `k` passages ranked by descending similarity.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyIndex`] when no datapoints were ever
    /// uploaded, [`IndexError::DimensionMismatch`] when the query embedding
    /// does not fit the index, or a backend error if the query fails.
    pub async fn search_top(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>, IndexError> {
        if self.handle.datapoint_count == 0 {
            return Err(IndexError::EmptyIndex);
        }

        let vector = self.provider.embed(query).await?;
        if vector.len() != self.handle.dimensions as usize {
            return Err(IndexError::DimensionMismatch {
                expected: self.handle.dimensions,
                actual: vector.len(),
            });
        }

        let hits = self
            .backend
            .find_neighbors(
                &self.handle.endpoint_id,
                &self.handle.deployed_index_id,
                vector,
                k,
            )
            .await?;
        debug!(query_len = query.len(), hits = hits.len(), "search complete");

        let mut results: Vec<ScoredPassage> = hits
            .iter()
            .filter_map(|hit| {
                Passage::from_payload(&hit.payload).map(|passage| ScoredPassage {
                    passage,
                    score: hit.score,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{IndexConfig, IndexManager};
    use crate::mock::InMemoryBackend;
    use chrono::{TimeZone, Utc};
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

    async fn deployed(
        dir: &TempDir,
        backend: &Arc<InMemoryBackend>,
        provider: &Arc<MockProvider>,
        corpus: &[Passage],
    ) -> RetrievalHandle {
        let config = IndexConfig {
            dimensions: 3,
            manifest_path: dir.path().join("manifest.json"),
            ..IndexConfig::default()
        };
        IndexManager::new(Arc::clone(backend), Arc::clone(provider), config)
            .deploy(corpus)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn nearest_passage_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let provider = Arc::new(
            MockProvider::default()
                .with_embedding("Revenue grew 10%", vec![1.0, 0.0, 0.0])
                .with_embedding("Net income declined", vec![0.0, 1.0, 0.0])
                .with_embedding("Cash reserves stable", vec![0.0, 0.0, 1.0])
                .with_embedding("how did revenue do?", vec![0.9, 0.1, 0.0]),
        );
        let corpus = vec![
            passage("Revenue grew 10%", 0),
            passage("Net income declined", 1),
            passage("Cash reserves stable", 2),
        ];
        let handle = deployed(&dir, &backend, &provider, &corpus).await;

        let retriever = Retriever::new(backend, provider, handle, RetrievalConfig::default());
        let results = retriever.search_top("how did revenue do?", 1).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.text, "Revenue grew 10%");
    }

    #[tokio::test]
    async fn results_are_sorted_descending() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let provider = Arc::new(
            MockProvider::default()
                .with_embedding("a", vec![1.0, 0.0, 0.0])
                .with_embedding("b", vec![0.5, 0.5, 0.0])
                .with_embedding("c", vec![0.0, 0.0, 1.0])
                .with_embedding("q", vec![1.0, 0.0, 0.0]),
        );
        let corpus = vec![passage("a", 0), passage("b", 1), passage("c", 2)];
        let handle = deployed(&dir, &backend, &provider, &corpus).await;

        let retriever = Retriever::new(backend, provider, handle, RetrievalConfig::default());
        let results = retriever.search("q").await.unwrap();

        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].passage.text, "a");
    }

    #[tokio::test]
    async fn empty_index_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let provider = Arc::new(MockProvider::default().with_default_embedding(vec![0.1, 0.2, 0.3]));
        let handle = deployed(&dir, &backend, &provider, &[]).await;

        let retriever = Retriever::new(backend, Arc::clone(&provider), handle, RetrievalConfig::default());
        let err = retriever.search("anything").await.unwrap_err();

        assert!(matches!(err, IndexError::EmptyIndex));
        // The query is never embedded when the index is known to be empty.
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let provider = Arc::new(MockProvider::default().with_default_embedding(vec![0.1, 0.2, 0.3]));
        let handle = deployed(&dir, &backend, &provider, &[passage("a", 0)]).await;

        let bad_provider = Arc::new(MockProvider::default().with_default_embedding(vec![0.1]));
        let retriever = Retriever::new(backend, bad_provider, handle, RetrievalConfig::default());
        let err = retriever.search("q").await.unwrap_err();

        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 1,
            }
        ));
    }

    #[tokio::test]
    async fn k_caps_result_count() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let provider = Arc::new(MockProvider::default().with_default_embedding(vec![0.1, 0.2, 0.3]));
        let corpus: Vec<Passage> = (0..6).map(|i| passage(&format!("p{i}"), i)).collect();
        let handle = deployed(&dir, &backend, &provider, &corpus).await;

        let retriever = Retriever::new(backend, provider, handle, RetrievalConfig { top_k: 2 });
        let results = retriever.search("q").await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
