//! Metadata describing how an index was built.

use serde::{Deserialize, Serialize};

use super::flat::Metric;
use crate::documents::ChunkingConfig;

/// Build-time facts stored alongside the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Length of every stored vector (0 for an empty index)
    pub dimension: usize,

    /// Metric used for search
    pub metric: Metric,

    /// Number of chunks in the arena
    pub chunk_count: usize,

    /// Number of distinct source documents
    pub document_count: usize,

    /// Name of the embedding model that produced the vectors, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Chunking parameters used, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingConfig>,

    /// Build timestamp (seconds since UNIX_EPOCH, UTC)
    pub created_at: u64,
}

impl IndexMetadata {
    /// Whether a query embedder is known to differ from the build-time one.
    ///
    /// Unknown model names on either side never count as a mismatch.
    pub fn model_differs_from(&self, model_name: &str) -> bool {
        self.embedding_model
            .as_deref()
            .is_some_and(|built_with| built_with != model_name)
    }
}
