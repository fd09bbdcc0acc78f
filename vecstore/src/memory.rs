use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::metric::similarity;
use crate::vecstore::{
    CollectionConfig, CreateOutcome, Point, PointId, ScoredRecord, VectorStore,
};

struct Collection {
    config: CollectionConfig,
    points: Vec<Point>,
    slots: HashMap<PointId, usize>,
}

/// MemoryStore is an in-process [`VectorStore`] using brute-force exact search.
/// Intended for testing and small deployments (thousands of points).
///
/// Results with equal scores keep insertion order.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in a collection, or None if it does not exist.
    pub fn point_count(&self, name: &str) -> Option<usize> {
        self.collections.read().get(name).map(|c| c.points.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> StoreError {
    StoreError::CollectionNotFound(name.to_string())
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.collections.read().contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        config: CollectionConfig,
    ) -> Result<CreateOutcome, StoreError> {
        config.validate()?;
        let mut cols = self.collections.write();
        match cols.entry(name.to_string()) {
            Entry::Occupied(e) => {
                let existing = e.get().config;
                if existing != config {
                    return Err(StoreError::SchemaConflict {
                        name: name.to_string(),
                        existing: existing.to_string(),
                    });
                }
                Ok(CreateOutcome::AlreadyExists)
            }
            Entry::Vacant(e) => {
                e.insert(Collection {
                    config,
                    points: Vec::new(),
                    slots: HashMap::new(),
                });
                tracing::info!(collection = name, %config, "collection created");
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionConfig, StoreError> {
        self.collections
            .read()
            .get(name)
            .map(|c| c.config)
            .ok_or_else(|| not_found(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        match self.collections.write().remove(name) {
            Some(_) => {
                tracing::info!(collection = name, "collection deleted");
                Ok(())
            }
            None => Err(not_found(name)),
        }
    }

    async fn upsert_points(&self, name: &str, points: Vec<Point>) -> Result<(), StoreError> {
        let mut cols = self.collections.write();
        let col = cols.get_mut(name).ok_or_else(|| not_found(name))?;

        for p in &points {
            col.config.check_vector(&p.vector)?;
        }

        for p in points {
            match col.slots.get(&p.id) {
                Some(&slot) => col.points[slot] = p,
                None => {
                    col.slots.insert(p.id.clone(), col.points.len());
                    col.points.push(p);
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let cols = self.collections.read();
        let col = cols.get(name).ok_or_else(|| not_found(name))?;
        col.config.check_vector(query)?;

        if col.points.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let metric = col.config.metric;
        let mut scored: Vec<(usize, f32)> = col
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, similarity(metric, query, &p.vector)))
            .collect();

        // Stable: ties keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let p = &col.points[i];
                ScoredRecord {
                    id: p.id.clone(),
                    score,
                    record: p.record.clone(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use crate::vecstore::IdentityRecord;

    const COL: &str = "faces";

    async fn store_with(size: usize, metric: Metric) -> MemoryStore {
        let s = MemoryStore::new();
        s.create_collection(COL, CollectionConfig::new(size, metric))
            .await
            .unwrap();
        s
    }

    #[tokio::test]
    async fn test_create_idempotent() {
        let s = MemoryStore::new();
        let cfg = CollectionConfig::new(4, Metric::Cosine);
        assert_eq!(
            s.create_collection(COL, cfg).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            s.create_collection(COL, cfg).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert!(s.collection_exists(COL).await.unwrap());
        assert_eq!(s.collection_info(COL).await.unwrap(), cfg);
    }

    #[tokio::test]
    async fn test_create_schema_conflict() {
        let s = store_with(4, Metric::Cosine).await;
        let err = s
            .create_collection(COL, CollectionConfig::new(4, Metric::Dot))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
        assert_eq!(s.collection_info(COL).await.unwrap().metric, Metric::Cosine);
    }

    #[tokio::test]
    async fn test_insert_and_search() {
        let s = store_with(4, Metric::Cosine).await;
        s.insert(COL, vec![1.0, 0.0, 0.0, 0.0], IdentityRecord::new("a"), None)
            .await
            .unwrap();
        s.insert(COL, vec![0.0, 1.0, 0.0, 0.0], IdentityRecord::new("b"), None)
            .await
            .unwrap();
        s.insert(COL, vec![0.9, 0.1, 0.0, 0.0], IdentityRecord::new("c"), None)
            .await
            .unwrap();

        let matches = s.search(COL, &[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].record.identity_id, "a");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        assert_eq!(matches[1].record.identity_id, "c");
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn test_dot_metric_ranks_by_magnitude() {
        let s = store_with(2, Metric::Dot).await;
        s.insert(COL, vec![1.0, 0.0], IdentityRecord::new("unit"), None)
            .await
            .unwrap();
        s.insert(COL, vec![3.0, 0.0], IdentityRecord::new("long"), None)
            .await
            .unwrap();
        let matches = s.search(COL, &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(matches[0].record.identity_id, "long");
        assert_eq!(matches[0].score, 3.0);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let s = store_with(2, Metric::Cosine).await;
        for id in ["first", "second", "third"] {
            s.insert(COL, vec![0.0, 1.0], IdentityRecord::new(id), None)
                .await
                .unwrap();
        }
        let ids: Vec<_> = s
            .search(COL, &[0.0, 1.0], 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.record.identity_id)
            .collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_insert_missing_collection() {
        let s = MemoryStore::new();
        let err = s
            .insert("never", vec![1.0], IdentityRecord::new("a"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(ref n) if n == "never"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_collection_unchanged() {
        let s = store_with(3, Metric::Cosine).await;
        let err = s
            .insert(COL, vec![1.0, 0.0], IdentityRecord::new("a"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { got: 2, want: 3 }));
        assert_eq!(s.point_count(COL), Some(0));

        let err = s.search(COL, &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { got: 1, want: 3 }));
    }

    #[tokio::test]
    async fn test_explicit_id_upserts() {
        let s = store_with(2, Metric::Cosine).await;
        let id = PointId::Num(7);
        s.insert(COL, vec![1.0, 0.0], IdentityRecord::new("old"), Some(id.clone()))
            .await
            .unwrap();
        let got = s
            .insert(COL, vec![0.0, 1.0], IdentityRecord::new("new"), Some(id.clone()))
            .await
            .unwrap();
        assert_eq!(got, id);
        assert_eq!(s.point_count(COL), Some(1));
        let m = s.search(COL, &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(m[0].record.identity_id, "new");
    }

    #[tokio::test]
    async fn test_generated_ids_are_distinct() {
        let s = store_with(2, Metric::Cosine).await;
        let a = s
            .insert(COL, vec![1.0, 0.0], IdentityRecord::new("x"), None)
            .await
            .unwrap();
        let b = s
            .insert(COL, vec![1.0, 0.0], IdentityRecord::new("x"), None)
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(s.point_count(COL), Some(2));
    }

    #[tokio::test]
    async fn test_batch_insert() {
        let s = store_with(3, Metric::Cosine).await;
        let ids = s
            .insert_batch(
                COL,
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
                vec![
                    IdentityRecord::new("a"),
                    IdentityRecord::new("b"),
                    IdentityRecord::new("c"),
                ],
                None,
                2,
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(s.point_count(COL), Some(3));

        let matches = s.search(COL, &[0.0, 0.0, 1.0], 1).await.unwrap();
        assert_eq!(matches[0].record.identity_id, "c");
    }

    #[tokio::test]
    async fn test_batch_length_mismatch() {
        let s = store_with(2, Metric::Cosine).await;
        let err = s
            .insert_batch(
                COL,
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![IdentityRecord::new("a")],
                None,
                10,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BatchLengthMismatch { .. }));
        assert_eq!(s.point_count(COL), Some(0));
    }

    #[tokio::test]
    async fn test_batch_partial_failure_keeps_earlier_chunks() {
        let s = store_with(2, Metric::Cosine).await;
        let err = s
            .insert_batch(
                COL,
                vec![
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![1.0, 1.0],
                    vec![1.0, 0.0, 0.0],
                ],
                (0..4).map(|i| IdentityRecord::new(format!("id{i}"))).collect(),
                Some((0..4u64).map(PointId::Num).collect()),
                2,
            )
            .await
            .unwrap_err();
        match &err {
            StoreError::BatchFailed { committed, .. } => assert_eq!(*committed, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root(), StoreError::DimensionMismatch { .. }));
        assert_eq!(s.point_count(COL), Some(2));
    }

    #[tokio::test]
    async fn test_empty_batch_requires_collection() {
        let s = MemoryStore::new();
        let err = s
            .insert_batch("never", vec![], vec![], None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_non_finite_vectors_rejected() {
        let s = store_with(2, Metric::Cosine).await;
        s.insert(COL, vec![0.2, 1.0], IdentityRecord::new("weak"), None)
            .await
            .unwrap();
        let err = s
            .insert(COL, vec![f32::NAN, 0.0], IdentityRecord::new("nan"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidVector(_)));
        let err = s
            .insert(COL, vec![f32::INFINITY, 0.0], IdentityRecord::new("inf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidVector(_)));
        s.insert(COL, vec![1.0, 0.0], IdentityRecord::new("exact"), None)
            .await
            .unwrap();
        assert_eq!(s.point_count(COL), Some(2));

        let top = s.search(COL, &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(top[0].record.identity_id, "exact");

        assert!(matches!(
            s.search(COL, &[f32::NAN, 1.0], 1).await,
            Err(StoreError::InvalidVector(_))
        ));
    }

    #[tokio::test]
    async fn test_nan_in_batch_writes_nothing_from_its_chunk() {
        let s = store_with(2, Metric::Cosine).await;
        let err = s
            .upsert_points(
                COL,
                vec![
                    Point {
                        id: PointId::Num(1),
                        vector: vec![1.0, 0.0],
                        record: IdentityRecord::new("a"),
                    },
                    Point {
                        id: PointId::Num(2),
                        vector: vec![0.0, f32::NAN],
                        record: IdentityRecord::new("b"),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidVector(_)));
        assert_eq!(s.point_count(COL), Some(0));
    }

    #[tokio::test]
    async fn test_search_empty() {
        let s = store_with(3, Metric::Cosine).await;
        let matches = s.search(COL, &[1.0, 0.0, 0.0], 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let s = store_with(3, Metric::Cosine).await;
        s.delete_collection(COL).await.unwrap();
        assert!(!s.collection_exists(COL).await.unwrap());
        assert!(matches!(
            s.delete_collection(COL).await,
            Err(StoreError::CollectionNotFound(_))
        ));
    }
}
