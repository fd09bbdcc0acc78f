//! [`FaceEmbedder`] backed by a DeepFace REST service.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbedConfig;
use crate::embed::{ConfigSlot, EmbedderInfo, FaceEmbedder};
use crate::error::EmbedError;
use crate::raster::Image;

const DEEPFACE_BASE_URL: &str = "http://localhost:5005";

/// Recognition models served by DeepFace and their output sizes.
pub const MODELS: &[(&str, usize)] = &[
    ("VGG-Face", 4096),
    ("Facenet", 128),
    ("Facenet512", 512),
    ("OpenFace", 128),
    ("DeepFace", 4096),
    ("DeepID", 160),
    ("ArcFace", 512),
    ("Dlib", 128),
    ("SFace", 128),
    ("GhostFaceNet", 512),
];

/// Face detector backends accepted by DeepFace.
pub const DETECTORS: &[&str] = &[
    "opencv",
    "ssd",
    "dlib",
    "mtcnn",
    "fastmtcnn",
    "retinaface",
    "mediapipe",
    "yolov8",
    "yunet",
    "centerface",
    "skip",
];

/// DeepFace reports an undetectable face with this message.
const NO_FACE_MARKER: &str = "Face could not be detected";

#[derive(Serialize)]
struct RepresentRequest<'a> {
    img: String,
    model_name: &'a str,
    detector_backend: &'a str,
    align: bool,
    enforce_detection: bool,
}

#[derive(Deserialize)]
struct RepresentResponse {
    #[serde(default)]
    results: Vec<RepresentResult>,
}

#[derive(Deserialize)]
struct RepresentResult {
    embedding: Vec<f64>,
}

/// Look up the declared output size of a DeepFace model (case-insensitive).
pub fn model_dimension(model: &str) -> Option<(&'static str, usize)> {
    MODELS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(model))
        .copied()
}

/// DeepFace embedder calling `POST {base_url}/represent`.
///
/// The raster is sent as a PNG data URI. Detection is enforced, so an
/// image without a face yields [`EmbedError::NoFaceDetected`].
pub struct DeepFace {
    client: Client,
    base_url: String,
    api_key: String,
    dim_override: usize,
    slot: ConfigSlot,
}

impl DeepFace {
    pub fn new() -> Self {
        Self::with_config(EmbedConfig::default())
    }

    pub fn with_config(cfg: EmbedConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: if cfg.base_url.is_empty() {
                DEEPFACE_BASE_URL.to_string()
            } else {
                cfg.base_url.trim_end_matches('/').to_string()
            },
            api_key: cfg.api_key,
            dim_override: cfg.dimension,
            slot: ConfigSlot::new(),
        }
    }

    async fn call_api(&self, info: &EmbedderInfo, image: &Image) -> Result<Vec<f32>, EmbedError> {
        let png = image.to_png()?;
        let body = RepresentRequest {
            img: format!("data:image/png;base64,{}", STANDARD.encode(png)),
            model_name: &info.model,
            detector_backend: &info.detector,
            align: true,
            enforce_detection: true,
        };

        let mut req = self
            .client
            .post(format!("{}/represent", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let resp = req
            .send()
            .await
            .map_err(|e| EmbedError::Failure(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if body.contains(NO_FACE_MARKER) {
                return Err(EmbedError::NoFaceDetected);
            }
            return Err(EmbedError::Failure(format!("HTTP {status}: {body}")));
        }

        let data: RepresentResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::Failure(e.to_string()))?;

        // One result per detected face; the first is the primary face.
        let first = data
            .results
            .into_iter()
            .next()
            .ok_or(EmbedError::NoFaceDetected)?;
        if first.embedding.is_empty() {
            return Err(EmbedError::NoFaceDetected);
        }
        if first.embedding.len() != info.dimension {
            return Err(EmbedError::DimensionMismatch {
                got: first.embedding.len(),
                want: info.dimension,
            });
        }
        Ok(first.embedding.iter().map(|&v| v as f32).collect())
    }
}

impl Default for DeepFace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceEmbedder for DeepFace {
    async fn configure(&self, model: &str, detector: &str) -> Result<EmbedderInfo, EmbedError> {
        let (model, declared) =
            model_dimension(model).ok_or_else(|| EmbedError::UnknownModel(model.to_string()))?;
        let detector = DETECTORS
            .iter()
            .find(|d| d.eq_ignore_ascii_case(detector))
            .ok_or_else(|| EmbedError::UnknownDetector(detector.to_string()))?;

        let dimension = if self.dim_override == 0 {
            declared
        } else {
            self.dim_override
        };
        let info = self.slot.set(EmbedderInfo {
            model: model.to_string(),
            detector: detector.to_string(),
            dimension,
        })?;
        tracing::info!(
            model = %info.model,
            detector = %info.detector,
            dimension = info.dimension,
            url = %self.base_url,
            "deepface embedder configured"
        );
        Ok(info)
    }

    async fn embed(&self, image: &Image) -> Result<Vec<f32>, EmbedError> {
        let info = self.slot.require()?;
        let vector = self.call_api(&info, image).await?;
        tracing::debug!(
            model = %info.model,
            width = image.width(),
            height = image.height(),
            "face embedded"
        );
        Ok(vector)
    }

    fn info(&self) -> Option<EmbedderInfo> {
        self.slot.get()
    }
}
