use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embed: provider not configured")]
    NotConfigured,

    #[error("embed: provider already configured with {model}/{detector}")]
    AlreadyConfigured { model: String, detector: String },

    #[error("embed: unknown model {0:?}")]
    UnknownModel(String),

    #[error("embed: unknown detector backend {0:?}")]
    UnknownDetector(String),

    #[error("embed: no face detected")]
    NoFaceDetected,

    #[error("embed: invalid image: {0}")]
    InvalidImage(String),

    #[error("embed: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("embed: {0}")]
    Failure(String),
}

impl EmbedError {
    /// Errors raised by `configure`, fatal at startup rather than per request.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EmbedError::NotConfigured
                | EmbedError::AlreadyConfigured { .. }
                | EmbedError::UnknownModel(_)
                | EmbedError::UnknownDetector(_)
        )
    }
}
