use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vecstore: collection not found: {0}")]
    CollectionNotFound(String),

    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: invalid vector: {0}")]
    InvalidVector(String),

    #[error("vecstore: batch length mismatch: {vectors} vectors, {records} records, {ids} ids")]
    BatchLengthMismatch {
        vectors: usize,
        records: usize,
        ids: usize,
    },

    #[error("vecstore: collection {name} exists with a different schema: {existing}")]
    SchemaConflict { name: String, existing: String },

    #[error("vecstore: invalid config: {0}")]
    InvalidConfig(String),

    #[error("vecstore: invalid collection name {0:?}")]
    InvalidName(String),

    #[error("vecstore: backend unavailable: {0}")]
    Unavailable(String),

    #[error("vecstore: backend error: HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("vecstore: invalid response: {0}")]
    InvalidResponse(String),

    #[error("vecstore: batch insert stopped after {committed} records: {source}")]
    BatchFailed {
        committed: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Returns true for failures reaching the backend, as opposed to
    /// rejections of the request itself.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Backend { status, .. } => *status >= 500,
            StoreError::BatchFailed { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }

    /// Unwraps a partial batch failure to the error that stopped it.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::BatchFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
