//! Query-time retrieval: embed a question and rank chunks by distance.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::documents::ChunkRecord;
use crate::embedding::{EmbedError, EmbeddingGenerator};
use crate::index::{IndexError, Metric, VectorIndex};

/// Similarity threshold presets for [`RetrievalResult::above_similarity`].
///
/// Values are on the scale of [`Metric::similarity`].
pub mod thresholds {
    /// Near-duplicate passages
    pub const VERY_SIMILAR: f32 = 0.85;

    /// Passages about the same concept
    pub const SIMILAR: f32 = 0.70;

    /// Loosely related passages
    pub const RELATED: f32 = 0.50;
}

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query embedding has {actual} dimensions, index was built with {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl RetrieveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetrieveError::Embedding(e) if e.is_retryable())
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Citation number, 1-based, in ranking order.
    pub rank: usize,
    /// Position of the chunk in the index arena.
    pub ordinal: usize,
    /// Distance under the index metric; smaller is closer.
    pub distance: f32,
    /// Distance mapped onto a larger-is-closer score.
    pub similarity: f32,
    pub chunk: ChunkRecord,
}

/// Hits ordered closest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetrievedChunk> {
        self.hits.iter()
    }

    /// Keep only hits whose similarity reaches `threshold`, renumbering citations.
    pub fn above_similarity(self, threshold: f32) -> Self {
        let hits = self
            .hits
            .into_iter()
            .filter(|hit| hit.similarity >= threshold)
            .enumerate()
            .map(|(i, hit)| RetrievedChunk { rank: i + 1, ..hit })
            .collect();
        Self { hits }
    }

    /// Chunk records in citation order.
    pub fn chunks(&self) -> Vec<&ChunkRecord> {
        self.hits.iter().map(|hit| &hit.chunk).collect()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a RetrievedChunk;
    type IntoIter = std::slice::Iter<'a, RetrievedChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// Ranks indexed chunks against free-text queries.
///
/// Holds only the query embedder; the index is borrowed per call, so one
/// retriever can serve any number of threads and index generations.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingGenerator>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingGenerator>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingGenerator> {
        &self.embedder
    }

    /// The `top_k` chunks closest to `query`.
    ///
    /// Returns fewer hits when the index holds fewer chunks, and none for an
    /// empty index.
    pub fn retrieve(
        &self,
        query: &str,
        index: &VectorIndex,
        top_k: usize,
    ) -> Result<RetrievalResult, RetrieveError> {
        if query.trim().is_empty() {
            return Err(RetrieveError::InvalidQuery("query is empty".to_string()));
        }
        validate_top_k(top_k)?;

        if index.metadata().model_differs_from(self.embedder.model_name()) {
            tracing::warn!(
                target: "retrieve",
                "index was built with embedding model '{}', querying with '{}'",
                index.metadata().embedding_model.as_deref().unwrap_or_default(),
                self.embedder.model_name()
            );
        }

        let vector = self.embedder.embed_one(query)?;
        let result = self.retrieve_by_vector(&vector, index, top_k)?;

        tracing::debug!(
            target: "retrieve",
            "query '{}' -> {} hits",
            preview(query),
            result.len()
        );
        Ok(result)
    }

    /// Rank chunks against an already embedded query.
    pub fn retrieve_by_vector(
        &self,
        vector: &[f32],
        index: &VectorIndex,
        top_k: usize,
    ) -> Result<RetrievalResult, RetrieveError> {
        validate_top_k(top_k)?;
        search(index, vector, top_k)
    }
}

fn validate_top_k(top_k: usize) -> Result<(), RetrieveError> {
    if top_k == 0 {
        return Err(RetrieveError::InvalidQuery(
            "top_k must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn search(
    index: &VectorIndex,
    vector: &[f32],
    top_k: usize,
) -> Result<RetrievalResult, RetrieveError> {
    if !index.is_empty() && vector.len() != index.dimension() {
        return Err(RetrieveError::DimensionMismatch {
            expected: index.dimension(),
            actual: vector.len(),
        });
    }

    let metric: Metric = index.metric();
    let hits = index
        .search(vector, top_k)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, neighbor)| {
            index.record(neighbor.ordinal).map(|record| RetrievedChunk {
                rank: i + 1,
                ordinal: neighbor.ordinal,
                distance: neighbor.distance,
                similarity: metric.similarity(neighbor.distance),
                chunk: record.clone(),
            })
        })
        .collect();

    Ok(RetrievalResult { hits })
}

fn preview(query: &str) -> &str {
    match query.char_indices().nth(60) {
        Some((end, _)) => &query[..end],
        None => query,
    }
}
