//! Face identity matching engine.
//!
//! Enrollment stores the embedding of a reference image together with an
//! [`IdentityRecord`]; authentication embeds a live frame, takes the nearest
//! stored vector and accepts it when its similarity reaches a threshold.
//!
//! ```text
//! reference image -> FaceEmbedder::embed -> MatchingEngine::enroll -> VectorStore::insert
//! live frame      -> FaceEmbedder::embed -> MatchingEngine::authenticate
//!                 -> VectorStore::search(top 1) -> threshold -> Accepted | Rejected
//! ```
//!
//! Providers are chosen by name through a [`Registry`], usually from a
//! [`Config`] file, and built once per process.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;

pub use config::{Config, EmbedderConfig, StoreConfig, expand_env};
pub use engine::{AuthOutcome, DEFAULT_COLLECTION, DEFAULT_THRESHOLD, MatchingEngine};
pub use error::{AuthError, ConfigError, EngineError, EnrollError, ErrorClass, ErrorKind};
pub use registry::Registry;

pub use faceid_embed::{EmbedError, FaceEmbedder, Image};
pub use faceid_vecstore::{
    CreateOutcome, IdentityRecord, Metric, PointId, StoreError, VectorStore,
};
