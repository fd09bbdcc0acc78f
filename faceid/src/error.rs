use faceid_embed::EmbedError;
use faceid_vecstore::StoreError;
use thiserror::Error;

/// Cause of a failed engine call, independent of which step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The embedding provider was never configured, or configured wrongly.
    ProviderUnconfigured,
    /// Provider or collection settings are inconsistent.
    Misconfigured,
    DimensionMismatch,
    CollectionMissing,
    /// The vector backend could not be reached or failed internally.
    BackendUnavailable,
    NoFaceDetected,
    /// The request itself is malformed (bad raster, bad threshold).
    InvalidInput,
    /// Any other backend failure.
    Backend,
}

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal at startup; abort initialization.
    Configuration,
    /// Client-correctable; the request should not be retried as is.
    Input,
    /// Service-side; the request may be retried.
    Backend,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ProviderUnconfigured | Self::Misconfigured => ErrorClass::Configuration,
            Self::DimensionMismatch | Self::NoFaceDetected | Self::InvalidInput => {
                ErrorClass::Input
            }
            Self::CollectionMissing | Self::BackendUnavailable | Self::Backend => {
                ErrorClass::Backend
            }
        }
    }
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend)
    }
}

pub(crate) fn embed_kind(e: &EmbedError) -> ErrorKind {
    match e {
        EmbedError::NotConfigured
        | EmbedError::AlreadyConfigured { .. }
        | EmbedError::UnknownModel(_)
        | EmbedError::UnknownDetector(_) => ErrorKind::ProviderUnconfigured,
        EmbedError::NoFaceDetected => ErrorKind::NoFaceDetected,
        EmbedError::InvalidImage(_) => ErrorKind::InvalidInput,
        EmbedError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
        EmbedError::Failure(_) => ErrorKind::Backend,
    }
}

pub(crate) fn store_kind(e: &StoreError) -> ErrorKind {
    match e.root() {
        StoreError::CollectionNotFound(_) => ErrorKind::CollectionMissing,
        StoreError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
        StoreError::BatchLengthMismatch { .. } | StoreError::InvalidVector(_) => {
            ErrorKind::InvalidInput
        }
        StoreError::SchemaConflict { .. }
        | StoreError::InvalidConfig(_)
        | StoreError::InvalidName(_) => ErrorKind::Misconfigured,
        other if other.is_unavailable() => ErrorKind::BackendUnavailable,
        _ => ErrorKind::Backend,
    }
}

/// Failure of an enrollment.
#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("faceid: enroll: embedding failed: {0}")]
    EmbeddingFailed(#[source] EmbedError),

    #[error("faceid: enroll: store failed: {0}")]
    StoreFailed(#[source] StoreError),
}

impl EnrollError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmbeddingFailed(e) => embed_kind(e),
            Self::StoreFailed(e) => store_kind(e),
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }
}

/// Failure of an authentication. A non-matching face is not an error; see
/// [`crate::AuthOutcome::Rejected`].
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("faceid: authenticate: embedding failed: {0}")]
    EmbeddingFailed(#[source] EmbedError),

    #[error("faceid: authenticate: search failed: {0}")]
    SearchFailed(#[source] StoreError),

    #[error("faceid: authenticate: threshold must be finite, got {0}")]
    InvalidThreshold(f32),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmbeddingFailed(e) => embed_kind(e),
            Self::SearchFailed(e) => store_kind(e),
            Self::InvalidThreshold(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }
}

/// Failure of a collection lifecycle call.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("faceid: {0}")]
    Store(#[from] StoreError),

    #[error("faceid: embedder produces {embedder}-dim vectors, collection wants {collection}")]
    EmbedderDimension { embedder: usize, collection: usize },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => store_kind(e),
            Self::EmbedderDimension { .. } => ErrorKind::DimensionMismatch,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmbedderDimension { .. } => ErrorClass::Configuration,
            Self::Store(_) => self.kind().class(),
        }
    }
}

/// Failure while building an engine from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("faceid: unknown {kind} provider {name:?} (known: {known})")]
    UnknownProvider {
        kind: &'static str,
        name: String,
        known: String,
    },

    #[error("faceid: {kind} provider {name:?} already registered")]
    DuplicateProvider { kind: &'static str, name: String },

    #[error("faceid: read {path}: {message}")]
    Read { path: String, message: String },

    #[error("faceid: parse config: {0}")]
    Parse(String),

    #[error("faceid: invalid config: {0}")]
    Invalid(String),

    #[error("faceid: embedder: {0}")]
    Embed(#[from] EmbedError),

    #[error("faceid: startup: {0}")]
    Startup(#[from] EngineError),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Embed(e) => embed_kind(e),
            Self::Startup(e) => e.kind(),
            _ => ErrorKind::Misconfigured,
        }
    }

    /// Startup can fail on an unreachable backend, which is worth retrying;
    /// everything else here is fatal.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Startup(e) => e.class(),
            _ => ErrorClass::Configuration,
        }
    }
}
