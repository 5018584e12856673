//! In-memory backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::backend::{BackendError, IndexBackend};
use crate::types::{
    DeployedIndexRef, DistanceMetric, EndpointDescriptor, IndexDatapoint, IndexDescriptor,
    IndexSpec, OperationRef, ScoredDatapoint,
};

#[derive(Debug, Default)]
struct State {
    indexes: Vec<IndexDescriptor>,
    endpoints: Vec<EndpointDescriptor>,
    points: HashMap<String, Vec<IndexDatapoint>>,
    /// Polls remaining before each pending operation reports done.
    operations: HashMap<String, u32>,
    next_id: u64,
    create_index_calls: usize,
    create_endpoint_calls: usize,
    deploy_calls: usize,
    upsert_batches: Vec<usize>,
    /// Fail the next N upserts with a retryable error.
    fail_upserts: u32,
    /// Fail the next upsert with a timeout.
    timeout_next_upsert: bool,
    /// Polls an operation must survive before completing.
    pending_polls: u32,
    /// Operations never complete, for deadline tests.
    never_complete: bool,
}

/// Scriptable in-memory implementation of [`IndexBackend`].
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    /// Pre-register an index, for ambiguity and reuse scenarios.
    pub fn seed_index(&self, spec: &IndexSpec) -> IndexDescriptor {
        let mut state = self.state.lock().unwrap();
        let descriptor = IndexDescriptor {
            resource_id: Self::fresh_id(&mut state, "idx"),
            display_name: spec.display_name.clone(),
            dimensions: spec.dimensions,
            distance_metric: spec.distance_metric,
            approx_neighbor_count: spec.approx_neighbor_count,
        };
        state.indexes.push(descriptor.clone());
        descriptor
    }

    /// Pre-register an endpoint, optionally with indexes already deployed.
    pub fn seed_endpoint(
        &self,
        display_name: &str,
        deployed: Vec<DeployedIndexRef>,
    ) -> EndpointDescriptor {
        let mut state = self.state.lock().unwrap();
        let descriptor = EndpointDescriptor {
            resource_id: Self::fresh_id(&mut state, "ep"),
            display_name: display_name.to_owned(),
            public: true,
            deployed,
        };
        state.endpoints.push(descriptor.clone());
        descriptor
    }

    /// Fail the next `n` upserts with a retryable HTTP error.
    pub fn fail_next_upserts(&self, n: u32) {
        self.state.lock().unwrap().fail_upserts = n;
    }

    /// Fail the next upsert with a timeout.
    pub fn timeout_next_upsert(&self) {
        self.state.lock().unwrap().timeout_next_upsert = true;
    }

    /// Require `n` polls before deployment operations complete.
    pub fn set_pending_polls(&self, n: u32) {
        self.state.lock().unwrap().pending_polls = n;
    }

    /// Deployment operations never complete.
    pub fn set_never_complete(&self) {
        self.state.lock().unwrap().never_complete = true;
    }

    #[must_use]
    pub fn create_index_calls(&self) -> usize {
        self.state.lock().unwrap().create_index_calls
    }

    #[must_use]
    pub fn create_endpoint_calls(&self) -> usize {
        self.state.lock().unwrap().create_endpoint_calls
    }

    #[must_use]
    pub fn deploy_calls(&self) -> usize {
        self.state.lock().unwrap().deploy_calls
    }

    /// Sizes of upsert batches that reached the backend, in order.
    #[must_use]
    pub fn upsert_batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().upsert_batches.clone()
    }

    /// Number of datapoints currently stored in the given index.
    #[must_use]
    pub fn datapoint_count(&self, index_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .points
            .get(index_id)
            .map_or(0, Vec::len)
    }
}

fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        DistanceMetric::DotProduct => dot,
        DistanceMetric::Cosine => {
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        DistanceMetric::Euclidean => {
            let dist: f32 = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            -dist
        }
    }
}

impl IndexBackend for InMemoryBackend {
    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, BackendError> {
        Ok(self.state.lock().unwrap().indexes.clone())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexDescriptor, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.create_index_calls += 1;
        let descriptor = IndexDescriptor {
            resource_id: Self::fresh_id(&mut state, "idx"),
            display_name: spec.display_name.clone(),
            dimensions: spec.dimensions,
            distance_metric: spec.distance_metric,
            approx_neighbor_count: spec.approx_neighbor_count,
        };
        state.indexes.push(descriptor.clone());
        Ok(descriptor)
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointDescriptor>, BackendError> {
        Ok(self.state.lock().unwrap().endpoints.clone())
    }

    async fn create_endpoint(
        &self,
        display_name: &str,
        public: bool,
    ) -> Result<EndpointDescriptor, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.create_endpoint_calls += 1;
        let descriptor = EndpointDescriptor {
            resource_id: Self::fresh_id(&mut state, "ep"),
            display_name: display_name.to_owned(),
            public,
            deployed: Vec::new(),
        };
        state.endpoints.push(descriptor.clone());
        Ok(descriptor)
    }

    async fn deploy_index(
        &self,
        endpoint_id: &str,
        index_id: &str,
        deployed_index_id: &str,
    ) -> Result<OperationRef, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.deploy_calls += 1;
        let endpoint = state
            .endpoints
            .iter_mut()
            .find(|e| e.resource_id == endpoint_id)
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("endpoint {endpoint_id} not found"),
            })?;
        endpoint.deployed.push(DeployedIndexRef {
            deployed_index_id: deployed_index_id.to_owned(),
            index_resource_id: index_id.to_owned(),
        });
        let polls = state.pending_polls;
        let op_id = Self::fresh_id(&mut state, "op");
        state.operations.insert(op_id.clone(), polls);
        Ok(OperationRef(op_id))
    }

    async fn operation_done(&self, operation: &OperationRef) -> Result<bool, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.never_complete {
            return Ok(false);
        }
        let remaining = state
            .operations
            .get_mut(&operation.0)
            .ok_or_else(|| BackendError::Other(format!("unknown operation {}", operation.0)))?;
        if *remaining == 0 {
            Ok(true)
        } else {
            *remaining -= 1;
            Ok(false)
        }
    }

    async fn upsert_datapoints(
        &self,
        index_id: &str,
        datapoints: Vec<IndexDatapoint>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.timeout_next_upsert {
            state.timeout_next_upsert = false;
            return Err(BackendError::Timeout);
        }
        if state.fail_upserts > 0 {
            state.fail_upserts -= 1;
            return Err(BackendError::Http("injected upsert failure".into()));
        }
        state.upsert_batches.push(datapoints.len());
        let stored = state.points.entry(index_id.to_owned()).or_default();
        for datapoint in datapoints {
            if let Some(existing) = stored
                .iter_mut()
                .find(|d| d.datapoint_id == datapoint.datapoint_id)
            {
                *existing = datapoint;
            } else {
                stored.push(datapoint);
            }
        }
        Ok(())
    }

    async fn find_neighbors(
        &self,
        endpoint_id: &str,
        deployed_index_id: &str,
        vector: Vec<f32>,
        neighbor_count: usize,
    ) -> Result<Vec<ScoredDatapoint>, BackendError> {
        let state = self.state.lock().unwrap();
        let endpoint = state
            .endpoints
            .iter()
            .find(|e| e.resource_id == endpoint_id)
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("endpoint {endpoint_id} not found"),
            })?;
        let deployed = endpoint
            .deployed
            .iter()
            .find(|d| d.deployed_index_id == deployed_index_id)
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("deployed index {deployed_index_id} not found"),
            })?;
        let metric = state
            .indexes
            .iter()
            .find(|i| i.resource_id == deployed.index_resource_id)
            .map_or(DistanceMetric::DotProduct, |i| i.distance_metric);
        let mut hits: Vec<ScoredDatapoint> = state
            .points
            .get(&deployed.index_resource_id)
            .map(|points| {
                points
                    .iter()
                    .map(|p| ScoredDatapoint {
                        datapoint_id: p.datapoint_id.clone(),
                        score: score(metric, &vector, &p.feature_vector),
                        payload: p.payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(neighbor_count);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> IndexSpec {
        IndexSpec {
            display_name: "test-index".into(),
            dimensions: 3,
            distance_metric: DistanceMetric::DotProduct,
            approx_neighbor_count: 10,
        }
    }

    fn point(id: &str, vector: Vec<f32>) -> IndexDatapoint {
        IndexDatapoint {
            datapoint_id: id.into(),
            feature_vector: vector,
            payload: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let backend = InMemoryBackend::new();
        let index = backend.seed_index(&spec());
        backend
            .upsert_datapoints(&index.resource_id, vec![point("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        backend
            .upsert_datapoints(&index.resource_id, vec![point("a", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(backend.datapoint_count(&index.resource_id), 1);
    }

    #[tokio::test]
    async fn neighbors_ranked_by_dot_product() {
        let backend = InMemoryBackend::new();
        let index = backend.seed_index(&spec());
        let endpoint = backend.seed_endpoint(
            "test-endpoint",
            vec![DeployedIndexRef {
                deployed_index_id: "dep".into(),
                index_resource_id: index.resource_id.clone(),
            }],
        );
        backend
            .upsert_datapoints(
                &index.resource_id,
                vec![
                    point("x", vec![1.0, 0.0, 0.0]),
                    point("y", vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let hits = backend
            .find_neighbors(&endpoint.resource_id, "dep", vec![0.9, 0.1, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(hits[0].datapoint_id, "x");
        assert_eq!(hits[1].datapoint_id, "y");
    }

    #[tokio::test]
    async fn operation_completes_after_pending_polls() {
        let backend = InMemoryBackend::new();
        backend.seed_endpoint("ep", Vec::new());
        backend.set_pending_polls(2);
        let endpoints = backend.list_endpoints().await.unwrap();
        let op = backend
            .deploy_index(&endpoints[0].resource_id, "idx-1", "dep")
            .await
            .unwrap();
        assert!(!backend.operation_done(&op).await.unwrap());
        assert!(!backend.operation_done(&op).await.unwrap());
        assert!(backend.operation_done(&op).await.unwrap());
    }
}
