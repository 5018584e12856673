//! REST implementation of [`IndexBackend`].
//!
//! Speaks a Vertex-style resource API: indexes and index endpoints are
//! listed and created under `/v1`, deployment is a long-running operation
//! polled at `/v1/operations/{id}`.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::backend::{BackendError, IndexBackend};
use crate::types::{
    DeployedIndexRef, DistanceMetric, EndpointDescriptor, IndexDatapoint, IndexDescriptor,
    IndexSpec, OperationRef, ScoredDatapoint,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    #[must_use]
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_token,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.base_url);
        trace!(url = %url, "GET");
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_reqwest)?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.base_url);
        trace!(url = %url, "POST");
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest)?;
        decode(response).await
    }
}

fn map_reqwest(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Http(e.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(BackendError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response.json().await.map_err(map_reqwest)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIndex {
    name: String,
    display_name: String,
    dimensions: u32,
    distance_metric: DistanceMetric,
    approximate_neighbor_count: u32,
}

impl From<WireIndex> for IndexDescriptor {
    fn from(wire: WireIndex) -> Self {
        Self {
            resource_id: wire.name,
            display_name: wire.display_name,
            dimensions: wire.dimensions,
            distance_metric: wire.distance_metric,
            approx_neighbor_count: wire.approximate_neighbor_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<WireIndex>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexRequest<'a> {
    display_name: &'a str,
    dimensions: u32,
    distance_metric: DistanceMetric,
    approximate_neighbor_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDeployedIndex {
    id: String,
    index: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEndpoint {
    name: String,
    display_name: String,
    #[serde(default)]
    public_endpoint_enabled: bool,
    #[serde(default)]
    deployed_indexes: Vec<WireDeployedIndex>,
}

impl From<WireEndpoint> for EndpointDescriptor {
    fn from(wire: WireEndpoint) -> Self {
        Self {
            resource_id: wire.name,
            display_name: wire.display_name,
            public: wire.public_endpoint_enabled,
            deployed: wire
                .deployed_indexes
                .into_iter()
                .map(|d| DeployedIndexRef {
                    deployed_index_id: d.id,
                    index_resource_id: d.index,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEndpointsResponse {
    #[serde(default)]
    index_endpoints: Vec<WireEndpoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEndpointRequest<'a> {
    display_name: &'a str,
    public_endpoint_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequest<'a> {
    deployed_index: DeployBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployBody<'a> {
    id: &'a str,
    index: &'a str,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest {
    datapoints: Vec<WireDatapoint>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDatapoint {
    datapoint_id: String,
    feature_vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsRequest {
    deployed_index_id: String,
    feature_vector: Vec<f32>,
    neighbor_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    neighbors: Vec<WireNeighbor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNeighbor {
    datapoint_id: String,
    distance: f32,
    #[serde(default)]
    payload: HashMap<String, serde_json::Value>,
}

impl IndexBackend for RestBackend {
    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>, BackendError> {
        let response: ListIndexesResponse = self.get_json("/v1/indexes").await?;
        Ok(response.indexes.into_iter().map(Into::into).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexDescriptor, BackendError> {
        let request = CreateIndexRequest {
            display_name: &spec.display_name,
            dimensions: spec.dimensions,
            distance_metric: spec.distance_metric,
            approximate_neighbor_count: spec.approx_neighbor_count,
        };
        let wire: WireIndex = self.post_json("/v1/indexes", &request).await?;
        Ok(wire.into())
    }

    async fn list_endpoints(&self) -> Result<Vec<EndpointDescriptor>, BackendError> {
        let response: ListEndpointsResponse = self.get_json("/v1/indexEndpoints").await?;
        Ok(response.index_endpoints.into_iter().map(Into::into).collect())
    }

    async fn create_endpoint(
        &self,
        display_name: &str,
        public: bool,
    ) -> Result<EndpointDescriptor, BackendError> {
        let request = CreateEndpointRequest {
            display_name,
            public_endpoint_enabled: public,
        };
        let wire: WireEndpoint = self.post_json("/v1/indexEndpoints", &request).await?;
        Ok(wire.into())
    }

    async fn deploy_index(
        &self,
        endpoint_id: &str,
        index_id: &str,
        deployed_index_id: &str,
    ) -> Result<OperationRef, BackendError> {
        let request = DeployRequest {
            deployed_index: DeployBody {
                id: deployed_index_id,
                index: index_id,
            },
        };
        let path = format!("/v1/indexEndpoints/{endpoint_id}:deployIndex");
        let response: OperationResponse = self.post_json(&path, &request).await?;
        response
            .name
            .map(OperationRef)
            .ok_or_else(|| BackendError::Other("deploy response carried no operation".into()))
    }

    async fn operation_done(&self, operation: &OperationRef) -> Result<bool, BackendError> {
        let path = format!("/v1/operations/{}", operation.0);
        let response: OperationResponse = self.get_json(&path).await?;
        if let Some(error) = response.error {
            return Err(BackendError::Other(format!(
                "operation {} failed: {}",
                operation.0, error.message
            )));
        }
        Ok(response.done)
    }

    async fn upsert_datapoints(
        &self,
        index_id: &str,
        datapoints: Vec<IndexDatapoint>,
    ) -> Result<(), BackendError> {
        let request = UpsertRequest {
            datapoints: datapoints
                .into_iter()
                .map(|d| WireDatapoint {
                    datapoint_id: d.datapoint_id,
                    feature_vector: d.feature_vector,
                    payload: d.payload,
                })
                .collect(),
        };
        let path = format!("/v1/indexes/{index_id}:upsertDatapoints");
        let _: serde_json::Value = self.post_json(&path, &request).await?;
        Ok(())
    }

    async fn find_neighbors(
        &self,
        endpoint_id: &str,
        deployed_index_id: &str,
        vector: Vec<f32>,
        neighbor_count: usize,
    ) -> Result<Vec<ScoredDatapoint>, BackendError> {
        let request = FindNeighborsRequest {
            deployed_index_id: deployed_index_id.to_owned(),
            feature_vector: vector,
            neighbor_count,
        };
        let path = format!("/v1/indexEndpoints/{endpoint_id}:findNeighbors");
        let response: FindNeighborsResponse = self.post_json(&path, &request).await?;
        Ok(response
            .neighbors
            .into_iter()
            .map(|n| ScoredDatapoint {
                datapoint_id: n.datapoint_id,
                score: n.distance,
                payload: n.payload,
            })
            .collect())
    }
}
