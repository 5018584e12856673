//! Backend abstraction over the remote vector index service.

use crate::types::{
    EndpointDescriptor, IndexDatapoint, IndexDescriptor, IndexSpec, OperationRef, ScoredDatapoint,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http transport error: {0}")]
    Http(String),

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Operations the index manager and retriever need from the remote service.
///
/// Implementations must be cheap to share behind an `Arc`.
pub trait IndexBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    fn list_indexes(
        &self,
    ) -> impl Future<Output = Result<Vec<IndexDescriptor>, BackendError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the service rejects the creation request.
    fn create_index(
        &self,
        spec: &IndexSpec,
    ) -> impl Future<Output = Result<IndexDescriptor, BackendError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    fn list_endpoints(
        &self,
    ) -> impl Future<Output = Result<Vec<EndpointDescriptor>, BackendError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the service rejects the creation request.
    fn create_endpoint(
        &self,
        display_name: &str,
        public: bool,
    ) -> impl Future<Output = Result<EndpointDescriptor, BackendError>> + Send;

    /// Start deploying an index to an endpoint. Deployment is asynchronous;
    /// poll the returned operation with [`IndexBackend::operation_done`].
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment request is rejected.
    fn deploy_index(
        &self,
        endpoint_id: &str,
        index_id: &str,
        deployed_index_id: &str,
    ) -> impl Future<Output = Result<OperationRef, BackendError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the poll request fails or the operation reports
    /// a failure.
    fn operation_done(
        &self,
        operation: &OperationRef,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Insert or overwrite datapoints by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails; [`BackendError::Timeout`] when
    /// the request exceeds the transport deadline.
    fn upsert_datapoints(
        &self,
        index_id: &str,
        datapoints: Vec<IndexDatapoint>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_neighbors(
        &self,
        endpoint_id: &str,
        deployed_index_id: &str,
        vector: Vec<f32>,
        neighbor_count: usize,
    ) -> impl Future<Output = Result<Vec<ScoredDatapoint>, BackendError>> + Send;
}
