//! Documents and chunking for RAG use cases.
//!
//! This module provides:
//! - Loading plain-text source documents from a directory
//! - Recursive separator chunking with configurable size and overlap
//! - The chunk and chunk-record types shared with the index

pub mod chunker;
pub mod config;
pub mod loader;
pub mod types;

pub use chunker::{Chunker, ChunkingError, RecursiveChunker, chunk_documents};
pub use config::{ChunkingConfig, DEFAULT_SEPARATORS};
pub use loader::{DocumentLoader, LoadError, LoadOutcome, SkippedDocument};
pub use types::{Chunk, ChunkRecord, Document};
