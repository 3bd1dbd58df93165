//! Embedding generation for chunks and queries.
//!
//! The pipeline never constructs a model itself: an [`EmbeddingGenerator`] is
//! passed in (`Arc<dyn EmbeddingGenerator>`), which lets tests swap in a
//! deterministic stub and keeps model lifetime in the caller's hands.

mod fastembed_generator;

pub use fastembed_generator::{FastEmbedGenerator, parse_model};

use thiserror::Error;

use crate::documents::Chunk;

/// Error type for embedding operations
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Unknown embedding model '{0}'")]
    UnknownModel(String),

    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding model failed: {0}")]
    Inference(String),

    #[error("Embedding count mismatch: sent {expected} texts, received {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },
}

impl EmbedError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbedError::Unavailable(_))
    }
}

/// Maps text to fixed-length vectors.
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed a batch of texts. The output is positionally aligned with the input.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Length of every vector this generator produces.
    fn dimension(&self) -> usize;

    /// Identifier recorded in index snapshots.
    fn model_name(&self) -> &str;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed(&[text])?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            actual => Err(EmbedError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

/// Attach embeddings to `chunks` in batches of `batch_size`.
///
/// The vector at position `i` always belongs to the chunk at position `i`.
/// `on_progress` receives `(embedded_so_far, total)` after each batch.
/// Any generator failure aborts the whole run; no partial output is returned.
pub fn embed_chunks<F>(
    chunks: Vec<Chunk>,
    generator: &dyn EmbeddingGenerator,
    batch_size: usize,
    mut on_progress: F,
) -> Result<Vec<Chunk>, EmbedError>
where
    F: FnMut(usize, usize),
{
    let total = chunks.len();
    let batch_size = batch_size.max(1);
    let mut embedded = Vec::with_capacity(total);
    let mut pending = chunks.into_iter();

    loop {
        let batch: Vec<Chunk> = pending.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }

        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = generator.embed(&texts)?;
        if vectors.len() != batch.len() {
            return Err(EmbedError::CountMismatch {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }

        embedded.extend(
            batch
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| chunk.with_embedding(vector)),
        );

        tracing::debug!(target: "embedding", "embedded {}/{total} chunks", embedded.len());
        on_progress(embedded.len(), total);
    }

    Ok(embedded)
}
