//! Retrieval core for question answering over local documents.
//!
//! Offline, documents are chunked, embedded and stored in an exact
//! nearest-neighbour index that is persisted as a versioned snapshot. Online,
//! a query is embedded, the closest chunks are retrieved, and a numbered
//! prompt is handed to a language model that answers with `[n]` citations.

pub mod logging;

pub mod answer;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod index;
pub mod indexing;
pub mod retrieve;
pub mod utils;

pub use answer::{Answer, AnswerError, Completion, CompletionError, OpenAiCompletion, QueryEngine};
pub use config::Settings;
pub use documents::{Chunk, ChunkRecord, Chunker, Document, RecursiveChunker, chunk_documents};
pub use embedding::{EmbedError, EmbeddingGenerator, FastEmbedGenerator};
pub use index::{IndexBuilder, IndexError, IndexState, Metric, SharedIndex, VectorIndex};
pub use indexing::{IndexProgress, IndexingError, IndexingPipeline, IndexingReport};
pub use retrieve::{RetrievalResult, RetrieveError, RetrievedChunk, Retriever};
