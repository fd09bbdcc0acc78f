use std::sync::Arc;

use faceid_embed::{FaceEmbedder, Image};
use faceid_vecstore::{
    CollectionConfig, CreateOutcome, IdentityRecord, Metric, PointId, VectorStore,
};

use crate::error::{AuthError, EngineError, EnrollError};

/// Collection used when the deployment does not name one.
pub const DEFAULT_COLLECTION: &str = "faces";

/// Acceptance threshold used when the deployment does not set one.
///
/// Carried over from the cosine deployments this engine replaces; its
/// false-accept/false-reject tradeoff has not been measured and should be
/// tuned per model.
pub const DEFAULT_THRESHOLD: f32 = 0.40;

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// The nearest enrolled vector scored at or above the threshold.
    Accepted { record: IdentityRecord, score: f32 },
    /// Nothing enrolled, or the nearest vector scored below the threshold.
    Rejected { best_score: Option<f32> },
}

impl AuthOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The matched identity, if accepted.
    pub fn record(&self) -> Option<&IdentityRecord> {
        match self {
            Self::Accepted { record, .. } => Some(record),
            Self::Rejected { .. } => None,
        }
    }
}

/// MatchingEngine enrolls faces into one collection and authenticates live
/// frames against it.
///
/// The engine owns long-lived handles to one embedding provider and one
/// vector store, shared across clones. It takes no locks of its own: calls
/// from concurrent requests go straight to the providers, which are
/// responsible for their own synchronization. Reads are eventually
/// consistent with concurrent writes.
#[derive(Clone)]
pub struct MatchingEngine {
    embedder: Arc<dyn FaceEmbedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl MatchingEngine {
    pub fn new(
        embedder: Arc<dyn FaceEmbedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &Arc<dyn FaceEmbedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Create the collection if needed. Safe to call repeatedly and from
    /// concurrent startups.
    pub async fn ensure_ready(
        &self,
        embedding_size: usize,
        metric: Metric,
    ) -> Result<CreateOutcome, EngineError> {
        if let Some(dim) = self.embedder.dimension().filter(|&d| d != embedding_size) {
            return Err(EngineError::EmbedderDimension {
                embedder: dim,
                collection: embedding_size,
            });
        }
        let outcome = self
            .store
            .create_collection(&self.collection, CollectionConfig::new(embedding_size, metric))
            .await?;
        tracing::debug!(collection = %self.collection, ?outcome, "collection ready");
        Ok(outcome)
    }

    pub async fn collection_exists(&self) -> Result<bool, EngineError> {
        Ok(self.store.collection_exists(&self.collection).await?)
    }

    /// Drop the collection and every enrolled vector. Administrative only.
    pub async fn delete_collection(&self) -> Result<(), EngineError> {
        self.store.delete_collection(&self.collection).await?;
        tracing::warn!(collection = %self.collection, "collection deleted");
        Ok(())
    }

    /// Embed a reference image and store it under `record`.
    ///
    /// Enrolling an identity again adds another reference vector; earlier
    /// ones are kept.
    pub async fn enroll(
        &self,
        image: &Image,
        record: IdentityRecord,
    ) -> Result<PointId, EnrollError> {
        let vector = self
            .embedder
            .embed(image)
            .await
            .map_err(EnrollError::EmbeddingFailed)?;
        self.enroll_vector(vector, record).await
    }

    /// Store a precomputed embedding under `record`.
    pub async fn enroll_vector(
        &self,
        vector: Vec<f32>,
        record: IdentityRecord,
    ) -> Result<PointId, EnrollError> {
        let identity = record.identity_id.clone();
        let id = self
            .store
            .insert(&self.collection, vector, record, None)
            .await
            .map_err(EnrollError::StoreFailed)?;
        tracing::info!(collection = %self.collection, identity = %identity, point = %id, "identity enrolled");
        Ok(id)
    }

    /// Embed and store many reference images.
    ///
    /// Every image is embedded before anything is written, so an embedding
    /// failure leaves the collection untouched. Store writes are chunked by
    /// `batch_size` and not rolled back on failure.
    pub async fn enroll_batch(
        &self,
        images: &[Image],
        records: Vec<IdentityRecord>,
        batch_size: usize,
    ) -> Result<Vec<PointId>, EnrollError> {
        let mut vectors = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            match self.embedder.embed(image).await {
                Ok(v) => vectors.push(v),
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "batch enrollment embedding failed");
                    return Err(EnrollError::EmbeddingFailed(e));
                }
            }
        }
        let ids = self
            .store
            .insert_batch(&self.collection, vectors, records, None, batch_size)
            .await
            .map_err(EnrollError::StoreFailed)?;
        tracing::info!(collection = %self.collection, count = ids.len(), "identities enrolled");
        Ok(ids)
    }

    /// Embed a live frame and decide whether it matches an enrolled identity.
    pub async fn authenticate(
        &self,
        image: &Image,
        threshold: f32,
    ) -> Result<AuthOutcome, AuthError> {
        if !threshold.is_finite() {
            return Err(AuthError::InvalidThreshold(threshold));
        }
        let vector = self
            .embedder
            .embed(image)
            .await
            .map_err(AuthError::EmbeddingFailed)?;
        self.authenticate_vector(&vector, threshold).await
    }

    /// Decide whether a precomputed embedding matches an enrolled identity.
    ///
    /// Only the single nearest vector is considered; when several are
    /// equally near, the store's own ordering picks it.
    pub async fn authenticate_vector(
        &self,
        vector: &[f32],
        threshold: f32,
    ) -> Result<AuthOutcome, AuthError> {
        if !threshold.is_finite() {
            return Err(AuthError::InvalidThreshold(threshold));
        }
        let hits = self
            .store
            .search(&self.collection, vector, 1)
            .await
            .map_err(AuthError::SearchFailed)?;

        let Some(top) = hits.into_iter().next() else {
            tracing::debug!(collection = %self.collection, "no enrolled vectors");
            return Ok(AuthOutcome::Rejected { best_score: None });
        };

        if top.score >= threshold {
            tracing::debug!(identity = %top.record.identity_id, score = top.score, threshold, "accepted");
            Ok(AuthOutcome::Accepted {
                record: top.record,
                score: top.score,
            })
        } else {
            tracing::debug!(score = top.score, threshold, "rejected");
            Ok(AuthOutcome::Rejected {
                best_score: Some(top.score),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use faceid_embed::{EmbedError, EmbedderInfo};
    use faceid_vecstore::{MemoryStore, StoreError};

    use super::*;
    use crate::error::{ErrorClass, ErrorKind};

    const DIM: usize = 128;

    /// Maps an image's first pixel to a fixed vector; unknown colors have no face.
    struct StubEmbedder {
        vectors: HashMap<[u8; 3], Vec<f32>>,
        dim: Option<usize>,
    }

    #[async_trait]
    impl FaceEmbedder for StubEmbedder {
        async fn configure(&self, _: &str, _: &str) -> Result<EmbedderInfo, EmbedError> {
            self.info().ok_or(EmbedError::NotConfigured)
        }

        async fn embed(&self, image: &Image) -> Result<Vec<f32>, EmbedError> {
            if self.dim.is_none() {
                return Err(EmbedError::NotConfigured);
            }
            self.vectors
                .get(&image.pixel(0, 0))
                .cloned()
                .ok_or(EmbedError::NoFaceDetected)
        }

        fn info(&self) -> Option<EmbedderInfo> {
            self.dim.map(|dimension| EmbedderInfo {
                model: "stub".into(),
                detector: "stub".into(),
                dimension,
            })
        }
    }

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    const RED: [u8; 3] = [255, 0, 0];
    const GREEN: [u8; 3] = [0, 255, 0];
    const GRAY: [u8; 3] = [128, 128, 128];

    fn frame(rgb: [u8; 3]) -> Image {
        Image::filled(4, 4, rgb).unwrap()
    }

    fn engine_with(dim: Option<usize>) -> (MatchingEngine, Arc<MemoryStore>) {
        let embedder = StubEmbedder {
            vectors: HashMap::from([(RED, unit(0)), (GREEN, unit(1))]),
            dim,
        };
        let store = Arc::new(MemoryStore::new());
        let engine = MatchingEngine::new(Arc::new(embedder), store.clone(), DEFAULT_COLLECTION);
        (engine, store)
    }

    async fn ready_engine() -> (MatchingEngine, Arc<MemoryStore>) {
        let (engine, store) = engine_with(Some(DIM));
        engine.ensure_ready(DIM, Metric::Cosine).await.unwrap();
        (engine, store)
    }

    #[tokio::test]
    async fn ensure_ready_is_idempotent() {
        let (engine, store) = engine_with(Some(DIM));
        assert!(!engine.collection_exists().await.unwrap());
        assert_eq!(
            engine.ensure_ready(DIM, Metric::Cosine).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            engine.ensure_ready(DIM, Metric::Cosine).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert!(engine.collection_exists().await.unwrap());
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(0));
    }

    #[tokio::test]
    async fn ensure_ready_rejects_wrong_size() {
        let (engine, _) = engine_with(Some(DIM));
        let err = engine.ensure_ready(512, Metric::Cosine).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::EmbedderDimension {
                embedder: 128,
                collection: 512
            }
        ));
        assert!(!engine.collection_exists().await.unwrap());
    }

    #[tokio::test]
    async fn successful_authentication() {
        let (engine, _) = ready_engine().await;
        engine
            .enroll(&frame(RED), IdentityRecord::new("alice-01").with_name("Alice"))
            .await
            .unwrap();

        let outcome = engine.authenticate(&frame(RED), 0.9).await.unwrap();
        match outcome {
            AuthOutcome::Accepted { record, score } => {
                assert_eq!(record.identity_id, "alice-01");
                assert_eq!(record.name.as_deref(), Some("Alice"));
                assert!((score - 1.0).abs() < 1e-6);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejection_below_threshold() {
        let (engine, _) = ready_engine().await;
        engine
            .enroll(&frame(RED), IdentityRecord::new("alice-01"))
            .await
            .unwrap();

        let outcome = engine.authenticate(&frame(GREEN), 0.9).await.unwrap();
        match outcome {
            AuthOutcome::Rejected { best_score } => {
                assert!(best_score.unwrap().abs() < 1e-6);
            }
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_collection_rejects() {
        let (engine, _) = ready_engine().await;
        assert_eq!(
            engine.authenticate(&frame(RED), 0.0).await.unwrap(),
            AuthOutcome::Rejected { best_score: None }
        );
    }

    #[tokio::test]
    async fn threshold_monotonic() {
        let (engine, _) = ready_engine().await;
        let mut v = unit(0);
        v[1] = 1.0;
        engine
            .enroll_vector(v, IdentityRecord::new("bob"))
            .await
            .unwrap();

        // Similarity to e1 is 1/sqrt(2) ~ 0.707.
        let mut accepted_at = Vec::new();
        for t in [1.0f32, 0.8, 0.75, 0.7, 0.5, 0.0, -1.0] {
            let outcome = engine.authenticate_vector(&unit(0), t).await.unwrap();
            accepted_at.push(outcome.is_accepted());
        }
        assert_eq!(accepted_at, [false, false, false, true, true, true, true]);
    }

    #[tokio::test]
    async fn no_face_is_a_typed_failure() {
        let (engine, store) = ready_engine().await;

        let err = engine
            .enroll(&frame(GRAY), IdentityRecord::new("carol"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollError::EmbeddingFailed(EmbedError::NoFaceDetected)
        ));
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(0));

        let err = engine.authenticate(&frame(GRAY), 0.4).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::EmbeddingFailed(EmbedError::NoFaceDetected)
        ));
        assert_eq!(err.class(), ErrorClass::Input);
    }

    #[tokio::test]
    async fn unconfigured_provider() {
        let (engine, _) = engine_with(None);
        engine.ensure_ready(DIM, Metric::Cosine).await.unwrap();
        let err = engine.authenticate(&frame(RED), 0.4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnconfigured);
    }

    #[tokio::test]
    async fn enroll_without_collection() {
        let (engine, _) = engine_with(Some(DIM));
        let err = engine
            .enroll(&frame(RED), IdentityRecord::new("alice-01"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollError::StoreFailed(StoreError::CollectionNotFound(_))
        ));
        assert_eq!(err.kind(), ErrorKind::CollectionMissing);

        let err = engine.authenticate(&frame(RED), 0.4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionMissing);
    }

    #[tokio::test]
    async fn dimension_mismatch_on_vector_paths() {
        let (engine, store) = ready_engine().await;
        let err = engine
            .enroll_vector(vec![1.0; 3], IdentityRecord::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(0));

        let err = engine.authenticate_vector(&[1.0; 3], 0.4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[tokio::test]
    async fn invalid_threshold() {
        let (engine, _) = ready_engine().await;
        assert!(matches!(
            engine.authenticate(&frame(RED), f32::NAN).await,
            Err(AuthError::InvalidThreshold(_))
        ));
    }

    #[tokio::test]
    async fn non_finite_vectors_are_input_errors() {
        let (engine, store) = ready_engine().await;
        engine
            .enroll_vector(unit(0), IdentityRecord::new("alice-01"))
            .await
            .unwrap();

        let mut poisoned = unit(1);
        poisoned[0] = f32::NAN;
        let err = engine
            .enroll_vector(poisoned.clone(), IdentityRecord::new("mallory"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(1));

        let err = engine.authenticate_vector(&poisoned, 0.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let outcome = engine.authenticate_vector(&unit(0), 0.0).await.unwrap();
        assert_eq!(outcome.record().unwrap().identity_id, "alice-01");
    }

    #[tokio::test]
    async fn reenrollment_adds_reference_vectors() {
        let (engine, store) = ready_engine().await;
        let a = engine
            .enroll(&frame(RED), IdentityRecord::new("alice-01"))
            .await
            .unwrap();
        let b = engine
            .enroll(&frame(GREEN), IdentityRecord::new("alice-01"))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(2));

        for rgb in [RED, GREEN] {
            let outcome = engine.authenticate(&frame(rgb), 0.9).await.unwrap();
            assert_eq!(outcome.record().unwrap().identity_id, "alice-01");
        }
    }

    #[tokio::test]
    async fn batch_enrollment() {
        let (engine, store) = ready_engine().await;
        let ids = engine
            .enroll_batch(
                &[frame(RED), frame(GREEN)],
                vec![IdentityRecord::new("alice-01"), IdentityRecord::new("bob-02")],
                1,
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(2));

        let outcome = engine.authenticate(&frame(GREEN), 0.9).await.unwrap();
        assert_eq!(outcome.record().unwrap().identity_id, "bob-02");
    }

    #[tokio::test]
    async fn batch_embedding_failure_writes_nothing() {
        let (engine, store) = ready_engine().await;
        let err = engine
            .enroll_batch(
                &[frame(RED), frame(GRAY)],
                vec![IdentityRecord::new("a"), IdentityRecord::new("b")],
                10,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_engine() {
        let (engine, store) = ready_engine().await;
        engine
            .enroll(&frame(RED), IdentityRecord::new("alice-01"))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    engine
                        .authenticate(&frame(RED), 0.9)
                        .await
                        .map(|o| o.is_accepted())
                        .unwrap()
                } else {
                    engine
                        .enroll(&frame(GREEN), IdentityRecord::new(format!("user-{i}")))
                        .await
                        .is_ok()
                }
            }));
        }
        for t in tasks {
            assert!(t.await.unwrap());
        }
        assert_eq!(store.point_count(DEFAULT_COLLECTION), Some(9));
    }

    #[tokio::test]
    async fn delete_collection() {
        let (engine, _) = ready_engine().await;
        engine.delete_collection().await.unwrap();
        assert!(!engine.collection_exists().await.unwrap());
        let err = engine.delete_collection().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionMissing);
    }
}
