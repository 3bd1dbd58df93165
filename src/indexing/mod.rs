//! Offline indexing: load, chunk, embed, build and publish.
//!
//! ```text
//! LOAD → CHUNK → EMBED → BUILD → SAVE
//!   │       │       │       │       │
//!   ▼       ▼       ▼       ▼       ▼
//! [docs] [chunks] [vecs] [index] snapshot
//! ```
//!
//! Per-document data problems are collected into the report. Configuration
//! and availability errors abort the run before anything is written, so the
//! previous snapshot stays in place.

mod pipeline;

pub use pipeline::IndexingPipeline;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::documents::{ChunkingError, LoadError, SkippedDocument};
use crate::embedding::EmbedError;
use crate::index::IndexError;

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("No document produced any chunk ({} skipped); existing index left unchanged", skipped.len())]
    EmptyCorpus { skipped: Vec<SkippedDocument> },
}

impl IndexingError {
    /// Whether rerunning the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexingError::Embedding(e) if e.is_retryable())
    }
}

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexProgress {
    Loaded { documents: usize, skipped: usize },
    Chunked { chunks: usize },
    Embedding { done: usize, total: usize },
    Built { chunks: usize, dimension: usize },
    Saved { path: PathBuf },
}

/// Wall time spent in each stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub load: Duration,
    pub chunk: Duration,
    pub embed: Duration,
    pub build: Duration,
    pub save: Duration,
}

/// Summary of a completed indexing run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexingReport {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub dimension: usize,
    pub skipped: Vec<SkippedDocument>,
    pub snapshot_path: PathBuf,
    pub elapsed: Duration,
    pub timings: StageTimings,
}

impl IndexingReport {
    /// Chunks embedded per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.chunks_indexed as f64 / secs
        } else {
            0.0
        }
    }
}
