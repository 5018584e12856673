//! Idempotent provisioning and corpus upload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use finq_llm::LlmProvider;

use crate::backend::{BackendError, IndexBackend};
use crate::error::IndexError;
use crate::manifest::UploadManifest;
use crate::types::{
    DeploymentBinding, DistanceMetric, EndpointDescriptor, IndexDatapoint, IndexDescriptor,
    IndexSpec, Passage, RetrievalHandle,
};

const POLL_INITIAL_DELAY: Duration = Duration::from_secs(2);
const POLL_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub index_name: String,
    pub endpoint_name: String,
    pub deployed_index_id: String,
    pub dimensions: u32,
    pub distance_metric: DistanceMetric,
    pub approx_neighbor_count: u32,
    pub upload_batch_size: usize,
    pub upload_max_retries: u32,
    pub deploy_timeout: Duration,
    pub manifest_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_name: "finq-filings".into(),
            endpoint_name: "finq-filings-endpoint".into(),
            deployed_index_id: "finq_deployed_index".into(),
            dimensions: 768,
            distance_metric: DistanceMetric::DotProduct,
            approx_neighbor_count: 150,
            upload_batch_size: 5000,
            upload_max_retries: 3,
            deploy_timeout: Duration::from_secs(600),
            manifest_path: PathBuf::from(".finq/upload-manifest.json"),
        }
    }
}

/// Provisions the remote index, binds it to a serving endpoint and uploads
/// the embedded corpus. All steps are idempotent: existing resources are
/// reused by display name and an existing binding is left untouched.
pub struct IndexManager<B, P> {
    backend: Arc<B>,
    provider: Arc<P>,
    config: IndexConfig,
}

impl<B: IndexBackend, P: LlmProvider> IndexManager<B, P> {
    pub fn new(backend: Arc<B>, provider: Arc<P>, config: IndexConfig) -> Self {
        Self {
            backend,
            provider,
            config,
        }
    }

    /// Bring the index online and upload the corpus, returning a handle the
    /// retriever can query.
    ///
    /// # Errors
    ///
    /// Returns an error when resource names are ambiguous, when the backend
    /// rejects a request, when deployment does not finish within the
    /// configured timeout, or when a batch upload exhausts its retries.
    pub async fn deploy(&self, passages: &[Passage]) -> Result<RetrievalHandle, IndexError> {
        let index = self.resolve_index().await?;
        let endpoint = self.resolve_endpoint().await?;
        self.ensure_binding(&index, &endpoint).await?;
        self.upload(&index, passages).await?;

        info!(
            index = %index.resource_id,
            endpoint = %endpoint.resource_id,
            datapoints = passages.len(),
            "index deployed"
        );
        Ok(RetrievalHandle {
            endpoint_id: endpoint.resource_id,
            deployed_index_id: self.config.deployed_index_id.clone(),
            dimensions: self.config.dimensions,
            datapoint_count: passages.len() as u64,
        })
    }

    async fn resolve_index(&self) -> Result<IndexDescriptor, IndexError> {
        let name = &self.config.index_name;
        let mut matches: Vec<IndexDescriptor> = self
            .backend
            .list_indexes()
            .await?
            .into_iter()
            .filter(|i| &i.display_name == name)
            .collect();
        if matches.len() > 1 {
            return Err(IndexError::Ambiguous {
                kind: "index",
                name: name.clone(),
            });
        }
        match matches.pop() {
            Some(existing) => {
                debug!(name = %name, "reusing existing index");
                Ok(existing)
            }
            None => {
                info!(name = %name, "creating index");
                let spec = IndexSpec {
                    display_name: name.clone(),
                    dimensions: self.config.dimensions,
                    distance_metric: self.config.distance_metric,
                    approx_neighbor_count: self.config.approx_neighbor_count,
                };
                Ok(self.backend.create_index(&spec).await?)
            }
        }
    }

    async fn resolve_endpoint(&self) -> Result<EndpointDescriptor, IndexError> {
        let name = &self.config.endpoint_name;
        let mut matches: Vec<EndpointDescriptor> = self
            .backend
            .list_endpoints()
            .await?
            .into_iter()
            .filter(|e| &e.display_name == name)
            .collect();
        if matches.len() > 1 {
            return Err(IndexError::Ambiguous {
                kind: "endpoint",
                name: name.clone(),
            });
        }
        match matches.pop() {
            Some(existing) => {
                debug!(name = %name, "reusing existing endpoint");
                Ok(existing)
            }
            None => {
                info!(name = %name, "creating endpoint");
                Ok(self.backend.create_endpoint(name, true).await?)
            }
        }
    }

    async fn ensure_binding(
        &self,
        index: &IndexDescriptor,
        endpoint: &EndpointDescriptor,
    ) -> Result<DeploymentBinding, IndexError> {
        if let Some(existing) = endpoint
            .deployed
            .iter()
            .find(|d| d.index_resource_id == index.resource_id)
        {
            debug!(deployed_index_id = %existing.deployed_index_id, "index already deployed");
            return Ok(DeploymentBinding {
                index_resource_id: index.resource_id.clone(),
                endpoint_resource_id: endpoint.resource_id.clone(),
                deployed_index_id: existing.deployed_index_id.clone(),
            });
        }

        info!(
            index = %index.resource_id,
            endpoint = %endpoint.resource_id,
            "deploying index to endpoint"
        );
        let operation = self
            .backend
            .deploy_index(
                &endpoint.resource_id,
                &index.resource_id,
                &self.config.deployed_index_id,
            )
            .await?;

        let deadline = Instant::now() + self.config.deploy_timeout;
        let mut delay = POLL_INITIAL_DELAY;
        loop {
            if self.backend.operation_done(&operation).await? {
                break;
            }
            if Instant::now() + delay > deadline {
                return Err(IndexError::DeployTimeout {
                    deployed_index_id: self.config.deployed_index_id.clone(),
                    timeout_secs: self.config.deploy_timeout.as_secs(),
                });
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(POLL_MAX_DELAY);
        }

        Ok(DeploymentBinding {
            index_resource_id: index.resource_id.clone(),
            endpoint_resource_id: endpoint.resource_id.clone(),
            deployed_index_id: self.config.deployed_index_id.clone(),
        })
    }

    async fn upload(&self, index: &IndexDescriptor, passages: &[Passage]) -> Result<(), IndexError> {
        if passages.is_empty() {
            debug!("corpus is empty, nothing to upload");
            return Ok(());
        }

        let batch_size = self.config.upload_batch_size;
        let mut manifest = match UploadManifest::load(&self.config.manifest_path)? {
            Some(existing) if existing.matches(passages, batch_size) && !existing.is_finished() => {
                info!(
                    completed = existing.completed.len(),
                    total = existing.total_batches,
                    "resuming interrupted upload"
                );
                existing
            }
            _ => UploadManifest::new(passages, batch_size),
        };

        for (batch_number, batch) in passages.chunks(batch_size).enumerate() {
            if manifest.is_completed(batch_number) {
                debug!(batch = batch_number, "batch already uploaded, skipping");
                continue;
            }
            let datapoints = self.embed_batch(batch).await?;
            self.upsert_with_retry(&index.resource_id, batch_number, datapoints)
                .await?;
            manifest.mark_completed(batch_number);
            manifest.save(&self.config.manifest_path)?;
        }

        // A finished upload leaves no journal behind so the next run starts
        // clean. A leftover finished manifest is harmless either way: the
        // resume check only picks up unfinished ones.
        self.clear_manifest();
        Ok(())
    }

    fn clear_manifest(&self) {
        if let Err(e) = std::fs::remove_file(&self.config.manifest_path) {
            warn!(error = %e, "failed to remove finished upload manifest");
        }
    }

    async fn embed_batch(&self, batch: &[Passage]) -> Result<Vec<IndexDatapoint>, IndexError> {
        let mut datapoints = Vec::with_capacity(batch.len());
        for passage in batch {
            let vector = self.provider.embed(&passage.text).await?;
            if vector.len() != self.config.dimensions as usize {
                return Err(IndexError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: vector.len(),
                });
            }
            datapoints.push(IndexDatapoint {
                datapoint_id: passage.datapoint_id(),
                feature_vector: vector,
                payload: passage.to_payload(),
            });
        }
        Ok(datapoints)
    }

    async fn upsert_with_retry(
        &self,
        index_id: &str,
        batch_number: usize,
        datapoints: Vec<IndexDatapoint>,
    ) -> Result<(), IndexError> {
        let mut attempt = 0;
        loop {
            match self
                .backend
                .upsert_datapoints(index_id, datapoints.clone())
                .await
            {
                Ok(()) => {
                    debug!(batch = batch_number, size = datapoints.len(), "batch uploaded");
                    return Ok(());
                }
                // A timeout means the request ran its full transport deadline;
                // retrying would double the damage on a struggling service.
                Err(BackendError::Timeout) => {
                    return Err(IndexError::Upload {
                        batch: batch_number,
                        source: BackendError::Timeout,
                    });
                }
                Err(e) if attempt < self.config.upload_max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(
                        batch = batch_number,
                        attempt,
                        error = %e,
                        "batch upload failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(IndexError::Upload {
                        batch: batch_number,
                        source: e,
                    });
                }
            }
        }
    }
}
