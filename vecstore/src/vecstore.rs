use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StoreError;
use crate::metric::Metric;

/// Chunk size used by [`VectorStore::insert_batch`] when the caller passes 0.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Schema of a collection: every vector has `size` components and is ranked
/// by `metric`. Both are immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub size: usize,
    pub metric: Metric,
}

impl CollectionConfig {
    pub fn new(size: usize, metric: Metric) -> Self {
        Self { size, metric }
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.size == 0 {
            return Err(StoreError::InvalidConfig(
                "vector size must be positive".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_len(&self, got: usize) -> Result<(), StoreError> {
        if got != self.size {
            return Err(StoreError::DimensionMismatch {
                got,
                want: self.size,
            });
        }
        Ok(())
    }

    /// Length check plus [`check_finite`].
    pub(crate) fn check_vector(&self, v: &[f32]) -> Result<(), StoreError> {
        self.check_len(v.len())?;
        check_finite(v)
    }
}

/// Reject vectors with NaN or infinite components; their scores do not order.
pub(crate) fn check_finite(v: &[f32]) -> Result<(), StoreError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(StoreError::InvalidVector(format!(
            "component {i} is {}",
            v[i]
        ))),
        None => Ok(()),
    }
}

/// Reject collection names that are not a single URL-safe path segment
/// (`[A-Za-z0-9_.-]+`, not `.` or `..`).
pub fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && name != "."
        && name != "..";
    if !ok {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl fmt::Display for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "size={} metric={}", self.size, self.metric)
    }
}

/// Outcome of a successful [`VectorStore::create_collection`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The collection was already there with the same schema.
    AlreadyExists,
}

/// Identifier of a stored point.
///
/// Backends such as Qdrant only accept unsigned integers or UUIDs, so the
/// id space is restricted to those two forms everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(Uuid),
}

impl PointId {
    /// A fresh random (v4) UUID id.
    pub fn random() -> Self {
        Self::Uuid(Uuid::new_v4())
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<Uuid> for PointId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

/// Metadata attached to a stored vector.
///
/// The store never interprets it: it is written as the point payload at
/// insert time and handed back verbatim by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Identifier of the enrolled identity. Not unique within a collection:
    /// one identity may own several reference vectors.
    pub identity_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path of the reference image the vector was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Caller-defined auxiliary fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityRecord {
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            name: None,
            image_path: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A vector together with its id and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    #[serde(rename = "payload")]
    pub record: IdentityRecord,
}

/// ScoredRecord is a single result from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: PointId,

    /// Similarity between the query and the stored vector under the
    /// collection's metric. Higher values indicate higher similarity.
    pub score: f32,

    pub record: IdentityRecord,
}

/// VectorStore is a collection-oriented store of (vector, metadata) points.
///
/// All implementations must be safe for concurrent use (Send + Sync).
/// Calls are independent and non-transactional: a search racing an insert
/// on the same collection may or may not observe the new point.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Report whether the named collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create a collection. Creating a collection that already exists with
    /// the same schema succeeds with [`CreateOutcome::AlreadyExists`]; a
    /// different schema fails with [`StoreError::SchemaConflict`].
    async fn create_collection(
        &self,
        name: &str,
        config: CollectionConfig,
    ) -> Result<CreateOutcome, StoreError>;

    /// Return the schema of an existing collection.
    async fn collection_info(&self, name: &str) -> Result<CollectionConfig, StoreError>;

    /// Drop a collection and all of its points.
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Write points, replacing any point with the same id. Either every
    /// point of the call is validated or none is written.
    async fn upsert_points(&self, name: &str, points: Vec<Point>) -> Result<(), StoreError>;

    /// Return up to `limit` points nearest to `query`, ordered by
    /// descending score. An empty collection yields an empty result.
    async fn search(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Insert a single point. A random id is assigned when `id` is None.
    async fn insert(
        &self,
        name: &str,
        vector: Vec<f32>,
        record: IdentityRecord,
        id: Option<PointId>,
    ) -> Result<PointId, StoreError> {
        let id = id.unwrap_or_else(PointId::random);
        self.upsert_points(
            name,
            vec![Point {
                id: id.clone(),
                vector,
                record,
            }],
        )
        .await?;
        Ok(id)
    }

    /// Insert many points in chunks of `batch_size` (0 selects
    /// [`DEFAULT_BATCH_SIZE`]).
    ///
    /// Chunks are committed one after another. A failing chunk stops the
    /// batch with [`StoreError::BatchFailed`] and earlier chunks stay
    /// committed; retry with explicit ids to stay idempotent.
    async fn insert_batch(
        &self,
        name: &str,
        vectors: Vec<Vec<f32>>,
        records: Vec<IdentityRecord>,
        ids: Option<Vec<PointId>>,
        batch_size: usize,
    ) -> Result<Vec<PointId>, StoreError> {
        let n = vectors.len();
        let ids_len = ids.as_ref().map_or(n, Vec::len);
        if records.len() != n || ids_len != n {
            return Err(StoreError::BatchLengthMismatch {
                vectors: n,
                records: records.len(),
                ids: ids_len,
            });
        }
        if n == 0 {
            if !self.collection_exists(name).await? {
                return Err(StoreError::CollectionNotFound(name.to_string()));
            }
            return Ok(Vec::new());
        }

        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        let ids = ids.unwrap_or_else(|| (0..n).map(|_| PointId::random()).collect());

        let mut pending: Vec<Point> = ids
            .iter()
            .cloned()
            .zip(vectors)
            .zip(records)
            .map(|((id, vector), record)| Point { id, vector, record })
            .collect();

        let mut committed = 0;
        while !pending.is_empty() {
            let rest = pending.split_off(batch_size.min(pending.len()));
            let chunk = std::mem::replace(&mut pending, rest);
            let chunk_len = chunk.len();
            if let Err(e) = self.upsert_points(name, chunk).await {
                tracing::warn!(
                    collection = name,
                    committed,
                    remaining = n - committed,
                    error = %e,
                    "batch insert stopped"
                );
                return Err(StoreError::BatchFailed {
                    committed,
                    source: Box::new(e),
                });
            }
            committed += chunk_len;
            tracing::debug!(collection = name, committed, total = n, "batch chunk committed");
        }
        Ok(ids)
    }
}
