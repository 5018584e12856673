//! Filing ingestion: fetch SEC filings, extract their text, chunk it and
//! persist the chunks as a passage corpus.

pub mod error;
pub mod extract;
pub mod filings;
pub mod pipeline;
pub mod splitter;
pub mod store;

pub use error::IngestError;
pub use filings::{FilingRef, FilingsClient};
pub use pipeline::{IngestConfig, load_corpus, run_pipeline};
pub use splitter::TextSplitter;
pub use store::{FsObjectStore, ObjectStore, PassageMeta, Snapshot};
