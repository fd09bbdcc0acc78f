use async_trait::async_trait;

use crate::error::EmbedError;
use crate::raster::Image;

/// Model and detector a provider was configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub model: String,
    pub detector: String,
    /// Length of every vector this provider produces.
    pub dimension: usize,
}

/// FaceEmbedder turns a face image into a dense float32 vector.
///
/// `configure` selects the model and face-detector backend and must succeed
/// before `embed` is called; it may load a model and is meant to run once
/// per process. For a fixed configuration and input image the output is
/// deterministic.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Select the embedding model and detector backend.
    ///
    /// Repeating the call with the same pair returns the same info; a
    /// different pair fails with [`EmbedError::AlreadyConfigured`].
    async fn configure(&self, model: &str, detector: &str) -> Result<EmbedderInfo, EmbedError>;

    /// Return the embedding of the face in `image`.
    ///
    /// Fails with [`EmbedError::NotConfigured`] before `configure`, and with
    /// [`EmbedError::NoFaceDetected`] when the detector finds no face.
    async fn embed(&self, image: &Image) -> Result<Vec<f32>, EmbedError>;

    /// The configured model and detector, or None before `configure`.
    fn info(&self) -> Option<EmbedderInfo>;

    /// Return the dimensionality of the output vectors once configured.
    fn dimension(&self) -> Option<usize> {
        self.info().map(|i| i.dimension)
    }

    fn is_configured(&self) -> bool {
        self.info().is_some()
    }
}

/// Holds the one-time configuration of a provider.
pub(crate) struct ConfigSlot {
    inner: parking_lot::RwLock<Option<EmbedderInfo>>,
}

impl ConfigSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: parking_lot::RwLock::new(None),
        }
    }

    pub(crate) fn get(&self) -> Option<EmbedderInfo> {
        self.inner.read().clone()
    }

    pub(crate) fn require(&self) -> Result<EmbedderInfo, EmbedError> {
        self.get().ok_or(EmbedError::NotConfigured)
    }

    /// Store `info` unless a configuration is already present.
    pub(crate) fn set(&self, info: EmbedderInfo) -> Result<EmbedderInfo, EmbedError> {
        let mut slot = self.inner.write();
        match slot.as_ref() {
            Some(cur) if cur.model == info.model && cur.detector == info.detector => {
                Ok(cur.clone())
            }
            Some(cur) => Err(EmbedError::AlreadyConfigured {
                model: cur.model.clone(),
                detector: cur.detector.clone(),
            }),
            None => {
                *slot = Some(info.clone());
                Ok(info)
            }
        }
    }
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}
