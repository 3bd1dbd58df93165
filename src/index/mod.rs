//! Vector index over embedded chunks.
//!
//! The index is an arena of [`ChunkRecord`]s plus a flat vector store whose
//! row `i` is the embedding of record `i`. Search returns ordinals, and the
//! ordinal is the only key used to get back to chunk metadata. Both halves are
//! built together and persisted together, so they cannot drift apart.
//!
//! Indexes are immutable once built. Re-indexing builds a new one and
//! publishes it through [`SharedIndex`] or an atomic snapshot rename.

mod error;
mod flat;
mod metadata;
mod shared;
mod snapshot;

pub use error::{IndexError, IndexResult};
pub use flat::{FlatVectors, Metric, Neighbor, cosine_similarity};
pub use metadata::IndexMetadata;
pub use shared::{IndexState, Rebuild, SharedIndex};
pub use snapshot::{SNAPSHOT_FORMAT, SNAPSHOT_VERSION};

use std::collections::HashSet;

use crate::documents::{Chunk, ChunkRecord, ChunkingConfig};
use crate::utils::get_utc_timestamp;

/// Builds a [`VectorIndex`] from embedded chunks.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    metric: Metric,
    embedding_model: Option<String>,
    chunking: Option<ChunkingConfig>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Record the embedding model so query-time mismatches can be reported.
    pub fn embedding_model(mut self, name: impl Into<String>) -> Self {
        self.embedding_model = Some(name.into());
        self
    }

    pub fn chunking(mut self, config: ChunkingConfig) -> Self {
        self.chunking = Some(config);
        self
    }

    /// Build the index. Chunk order becomes ordinal order.
    ///
    /// Fails fast if any chunk lacks an embedding, if dimensions differ, or if
    /// a vector contains a non-finite value. An empty input builds an empty
    /// index that answers every query with no hits.
    pub fn build(self, chunks: Vec<Chunk>) -> IndexResult<VectorIndex> {
        let dimension = match chunks.first() {
            Some(first) => first
                .embedding
                .as_ref()
                .map(Vec::len)
                .ok_or_else(|| missing_embedding(0, first))?,
            None => 0,
        };

        let mut data = Vec::with_capacity(chunks.len() * dimension);
        let mut records = Vec::with_capacity(chunks.len());

        for (ordinal, chunk) in chunks.into_iter().enumerate() {
            let Some(embedding) = chunk.embedding.as_deref() else {
                return Err(missing_embedding(ordinal, &chunk));
            };
            if embedding.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    ordinal,
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            if dimension == 0 {
                return Err(IndexError::InvalidVector {
                    ordinal,
                    reason: "embedding is empty".to_string(),
                });
            }
            if let Some(position) = embedding.iter().position(|v| !v.is_finite()) {
                return Err(IndexError::InvalidVector {
                    ordinal,
                    reason: format!("non-finite value at position {position}"),
                });
            }

            data.extend_from_slice(embedding);
            records.push(chunk.record());
        }

        let document_count = records
            .iter()
            .map(|r| r.filename.as_str())
            .collect::<HashSet<_>>()
            .len();

        let metadata = IndexMetadata {
            dimension,
            metric: self.metric,
            chunk_count: records.len(),
            document_count,
            embedding_model: self.embedding_model,
            chunking: self.chunking,
            created_at: get_utc_timestamp(),
        };

        tracing::info!(
            target: "index",
            "built index: {} chunks from {} documents, {} dimensions, {:?}",
            metadata.chunk_count,
            metadata.document_count,
            dimension,
            metadata.metric
        );

        Ok(VectorIndex {
            records,
            vectors: FlatVectors::from_raw(dimension, data),
            metadata,
        })
    }
}

fn missing_embedding(ordinal: usize, chunk: &Chunk) -> IndexError {
    IndexError::MissingEmbedding {
        ordinal,
        filename: chunk.filename.clone(),
        chunk_id: chunk.chunk_id,
    }
}

/// Read-only exact nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    records: Vec<ChunkRecord>,
    vectors: FlatVectors,
    metadata: IndexMetadata,
}

impl VectorIndex {
    /// Build with default settings (squared L2, no model name recorded).
    pub fn build(chunks: Vec<Chunk>) -> IndexResult<Self> {
        IndexBuilder::new().build(chunks)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector length, 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.metadata.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metadata.metric
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Chunk metadata for an ordinal.
    pub fn record(&self, ordinal: usize) -> Option<&ChunkRecord> {
        self.records.get(ordinal)
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Stored embedding for an ordinal.
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        self.vectors.row(ordinal)
    }

    /// The `k` nearest ordinals to `query`, closest first, ties to the lower ordinal.
    ///
    /// An empty index returns no neighbours for any query.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<Neighbor>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(IndexError::QueryDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        Ok(self.vectors.search(query, k, self.metric()))
    }

    pub(crate) fn from_parts(
        records: Vec<ChunkRecord>,
        vectors: FlatVectors,
        metadata: IndexMetadata,
    ) -> Self {
        Self {
            records,
            vectors,
            metadata,
        }
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        self.vectors.raw()
    }
}
