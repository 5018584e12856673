use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable unit of retrievable text plus provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Identity of the originating document (company name for filings).
    pub source_id: String,
    pub filed_at: DateTime<Utc>,
    pub source_url: String,
    /// Position of this passage within its source document.
    pub chunk_index: usize,
}

impl Passage {
    /// Structural identity: the same content at the same position always
    /// hashes to the same id, so re-uploading a corpus upserts instead of
    /// duplicating.
    #[must_use]
    pub fn datapoint_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source_id.as_bytes());
        hasher.update(self.filed_at.to_rfc3339().as_bytes());
        hasher.update(&self.chunk_index.to_le_bytes());
        hasher.update(self.text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    #[must_use]
    pub fn to_payload(&self) -> HashMap<String, serde_json::Value> {
        let mut payload = HashMap::new();
        payload.insert("text".into(), serde_json::Value::String(self.text.clone()));
        payload.insert(
            "source_id".into(),
            serde_json::Value::String(self.source_id.clone()),
        );
        payload.insert(
            "filed_at".into(),
            serde_json::Value::String(self.filed_at.to_rfc3339()),
        );
        payload.insert(
            "source_url".into(),
            serde_json::Value::String(self.source_url.clone()),
        );
        payload.insert("chunk_index".into(), self.chunk_index.into());
        payload
    }

    /// Reconstruct a passage from a search-hit payload. Returns `None` when
    /// a required field is missing or malformed.
    #[must_use]
    pub fn from_payload(payload: &HashMap<String, serde_json::Value>) -> Option<Self> {
        let text = payload.get("text")?.as_str()?.to_owned();
        let source_id = payload.get("source_id")?.as_str()?.to_owned();
        let filed_at = DateTime::parse_from_rfc3339(payload.get("filed_at")?.as_str()?)
            .ok()?
            .with_timezone(&Utc);
        let source_url = payload.get("source_url")?.as_str()?.to_owned();
        let chunk_index = usize::try_from(payload.get("chunk_index")?.as_u64()?).ok()?;
        Some(Self {
            text,
            source_id,
            filed_at,
            source_url,
            chunk_index,
        })
    }
}

/// Distance measure configured on a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMetric {
    DotProduct,
    Cosine,
    Euclidean,
}

/// A remote approximate-nearest-neighbor index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub resource_id: String,
    pub display_name: String,
    pub dimensions: u32,
    pub distance_metric: DistanceMetric,
    pub approx_neighbor_count: u32,
}

/// Creation parameters for a new index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSpec {
    pub display_name: String,
    pub dimensions: u32,
    pub distance_metric: DistanceMetric,
    pub approx_neighbor_count: u32,
}

/// An index deployed to an endpoint, as reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedIndexRef {
    pub deployed_index_id: String,
    pub index_resource_id: String,
}

/// A serving endpoint capable of hosting deployed indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub resource_id: String,
    pub display_name: String,
    pub public: bool,
    #[serde(default)]
    pub deployed: Vec<DeployedIndexRef>,
}

/// The live association of an index with a serving endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentBinding {
    pub index_resource_id: String,
    pub endpoint_resource_id: String,
    pub deployed_index_id: String,
}

/// Reference to a long-running backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationRef(pub String);

/// A single embedded passage as uploaded to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDatapoint {
    pub datapoint_id: String,
    pub feature_vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A search hit with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDatapoint {
    pub datapoint_id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Everything the retriever needs to query the deployed index.
#[derive(Debug, Clone)]
pub struct RetrievalHandle {
    pub endpoint_id: String,
    pub deployed_index_id: String,
    pub dimensions: u32,
    /// Datapoints known to have been uploaded; zero means the index has
    /// never received a passage.
    pub datapoint_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn passage() -> Passage {
        Passage {
            text: "Revenue grew 10%".into(),
            source_id: "ACME".into(),
            filed_at: Utc.with_ymd_and_hms(2023, 10, 27, 16, 30, 21).unwrap(),
            source_url: "https://example.com/filing".into(),
            chunk_index: 3,
        }
    }

    #[test]
    fn datapoint_id_is_stable() {
        assert_eq!(passage().datapoint_id(), passage().datapoint_id());
    }

    #[test]
    fn datapoint_id_changes_with_content() {
        let mut other = passage();
        other.text = "Net income declined".into();
        assert_ne!(passage().datapoint_id(), other.datapoint_id());
    }

    #[test]
    fn datapoint_id_changes_with_position() {
        let mut other = passage();
        other.chunk_index = 4;
        assert_ne!(passage().datapoint_id(), other.datapoint_id());
    }

    #[test]
    fn payload_round_trip() {
        let p = passage();
        let decoded = Passage::from_payload(&p.to_payload()).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn from_payload_missing_field_is_none() {
        let mut payload = passage().to_payload();
        payload.remove("filed_at");
        assert!(Passage::from_payload(&payload).is_none());
    }

    #[test]
    fn distance_metric_wire_format() {
        let json = serde_json::to_string(&DistanceMetric::DotProduct).unwrap();
        assert_eq!(json, "\"DOT_PRODUCT\"");
    }
}
