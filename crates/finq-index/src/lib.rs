//! Vector index lifecycle management and retrieval.
//!
//! [`manager::IndexManager`] provisions a remote vector index and its serving
//! endpoint idempotently and uploads embedded passages in batches;
//! [`retriever::Retriever`] answers nearest-neighbor queries against the
//! deployed index.

pub mod backend;
pub mod error;
pub mod manager;
pub mod manifest;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod rest;
pub mod retriever;
pub mod types;

pub use backend::{BackendError, IndexBackend};
pub use error::IndexError;
pub use types::{
    DeploymentBinding, DistanceMetric, EndpointDescriptor, IndexDescriptor, Passage,
    RetrievalHandle,
};
