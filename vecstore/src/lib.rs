//! Collection-oriented vector storage.
//!
//! A [`VectorStore`] keeps named collections of `(vector, IdentityRecord)`
//! points. Each collection fixes a vector size and a [`Metric`] when it is
//! created. Two backends are provided:
//!
//! - [`MemoryStore`]: in-process, exact brute-force search.
//! - [`QdrantStore`]: a Qdrant server reached over its REST API.

pub mod error;
pub mod memory;
pub mod metric;
pub mod qdrant;
pub mod vecstore;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use metric::{Metric, cosine_similarity, similarity};
pub use qdrant::{DEFAULT_QDRANT_URL, QdrantStore};
pub use vecstore::{
    CollectionConfig, CreateOutcome, DEFAULT_BATCH_SIZE, IdentityRecord, Point, PointId,
    ScoredRecord, VectorStore, validate_collection_name,
};
