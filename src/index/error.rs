use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Chunk {ordinal} ({filename}#{chunk_id}) has no embedding")]
    MissingEmbedding {
        ordinal: usize,
        filename: String,
        chunk_id: u32,
    },

    #[error("Embedding dimension mismatch at chunk {ordinal}: expected {expected}, got {actual}")]
    DimensionMismatch {
        ordinal: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid embedding at chunk {ordinal}: {reason}")]
    InvalidVector { ordinal: usize, reason: String },

    #[error("Query vector has {actual} dimensions, index has {expected}")]
    QueryDimension { expected: usize, actual: usize },

    #[error("An index rebuild is already in progress")]
    RebuildInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not an index snapshot (format tag '{0}')")]
    UnsupportedFormat(String),

    #[error("Unsupported snapshot version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Snapshot is corrupted: {0}")]
    Corrupted(String),
}

impl IndexError {
    /// Errors caused by the inputs to a build rather than by storage.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            IndexError::MissingEmbedding { .. }
                | IndexError::DimensionMismatch { .. }
                | IndexError::InvalidVector { .. }
        )
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
