//! Deterministic local [`FaceEmbedder`] built from a grayscale thumbnail.
//!
//! No learned model is involved: the embedding is the mean-centred,
//! L2-normalised luma of the image area-averaged down to `N x N` cells.
//! Useful for fixtures, demos and pipelines that run without an inference
//! service.

use async_trait::async_trait;

use crate::embed::{ConfigSlot, EmbedderInfo, FaceEmbedder, l2_normalize};
use crate::error::EmbedError;
use crate::raster::Image;

/// Model names and their thumbnail side length.
pub const MODELS: &[(&str, usize)] = &[("thumb8", 8), ("thumb16", 16), ("thumb32", 32)];

/// `variance` rejects flat images; `skip` embeds anything.
pub const DETECTORS: &[&str] = &["variance", "skip"];

/// Luma standard deviation (0..255 scale) below which an image is considered
/// to contain no face.
pub const MIN_LUMA_STDDEV: f32 = 4.0;

/// Thumbnail embedder. CPU work runs on the blocking thread pool.
pub struct Thumbnail {
    slot: ConfigSlot,
}

impl Thumbnail {
    pub fn new() -> Self {
        Self {
            slot: ConfigSlot::new(),
        }
    }
}

impl Default for Thumbnail {
    fn default() -> Self {
        Self::new()
    }
}

fn side_of(model: &str) -> Option<(&'static str, usize)> {
    MODELS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(model))
        .copied()
}

fn stddev(values: &[f32]) -> f32 {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    var.sqrt() as f32
}

/// Compute the thumbnail embedding of `image` with `side x side` cells.
pub fn thumbnail_embedding(image: &Image, side: usize, detect: bool) -> Result<Vec<f32>, EmbedError> {
    let luma = image.luma();
    if detect && stddev(&luma) < MIN_LUMA_STDDEV {
        return Err(EmbedError::NoFaceDetected);
    }

    let w = image.width() as usize;
    let h = image.height() as usize;
    let mut cells = Vec::with_capacity(side * side);
    for cy in 0..side {
        let y0 = (cy * h / side).min(h - 1);
        let y1 = ((cy + 1) * h / side).clamp(y0 + 1, h);
        for cx in 0..side {
            let x0 = (cx * w / side).min(w - 1);
            let x1 = ((cx + 1) * w / side).clamp(x0 + 1, w);
            let mut sum = 0.0f64;
            for y in y0..y1 {
                let row = &luma[y * w..(y + 1) * w];
                sum += row[x0..x1].iter().map(|&v| v as f64).sum::<f64>();
            }
            cells.push((sum / ((y1 - y0) * (x1 - x0)) as f64) as f32);
        }
    }

    let mean = (cells.iter().map(|&c| c as f64).sum::<f64>() / cells.len() as f64) as f32;
    for c in cells.iter_mut() {
        *c -= mean;
    }
    if detect && cells.iter().all(|&c| c == 0.0) {
        return Err(EmbedError::NoFaceDetected);
    }
    l2_normalize(&mut cells);
    Ok(cells)
}

#[async_trait]
impl FaceEmbedder for Thumbnail {
    async fn configure(&self, model: &str, detector: &str) -> Result<EmbedderInfo, EmbedError> {
        let (model, side) =
            side_of(model).ok_or_else(|| EmbedError::UnknownModel(model.to_string()))?;
        let detector = DETECTORS
            .iter()
            .find(|d| d.eq_ignore_ascii_case(detector))
            .ok_or_else(|| EmbedError::UnknownDetector(detector.to_string()))?;
        let info = self.slot.set(EmbedderInfo {
            model: model.to_string(),
            detector: detector.to_string(),
            dimension: side * side,
        })?;
        tracing::info!(model = %info.model, detector = %info.detector, "thumbnail embedder configured");
        Ok(info)
    }

    async fn embed(&self, image: &Image) -> Result<Vec<f32>, EmbedError> {
        let info = self.slot.require()?;
        let side = side_of(&info.model)
            .map(|(_, s)| s)
            .ok_or_else(|| EmbedError::UnknownModel(info.model.clone()))?;
        let detect = info.detector != "skip";
        let image = image.clone();
        tokio::task::spawn_blocking(move || thumbnail_embedding(&image, side, detect))
            .await
            .map_err(|e| EmbedError::Failure(e.to_string()))?
    }

    fn info(&self) -> Option<EmbedderInfo> {
        self.slot.get()
    }
}
