//! Core types for documents and their chunks.

use serde::{Deserialize, Serialize};

/// A source document as produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Path of the document relative to the source directory.
    pub filename: String,

    /// Full extracted text.
    pub text: String,
}

impl Document {
    /// Create a new document.
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Whether the document has no content worth chunking.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A bounded slice of a document, optionally carrying its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The exact text of this slice.
    pub text: String,

    /// Document this chunk was cut from.
    pub filename: String,

    /// 0-based position of the chunk within its document.
    pub chunk_id: u32,

    /// Byte range of `text` in the source document (start, end).
    pub byte_range: (usize, usize),

    /// Embedding vector, attached once by the embedding stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a chunk without an embedding.
    pub fn new(
        text: impl Into<String>,
        filename: impl Into<String>,
        chunk_id: u32,
        byte_range: (usize, usize),
    ) -> Self {
        Self {
            text: text.into(),
            filename: filename.into(),
            chunk_id,
            byte_range,
            embedding: None,
        }
    }

    /// Attach an embedding, consuming the chunk.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Metadata kept in the index for this chunk.
    pub fn record(&self) -> ChunkRecord {
        ChunkRecord {
            text: self.text.clone(),
            filename: self.filename.clone(),
            chunk_id: self.chunk_id,
            byte_range: self.byte_range,
        }
    }
}

/// Chunk metadata stored in the index arena, addressed by ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub filename: String,
    pub chunk_id: u32,
    pub byte_range: (usize, usize),
}

impl ChunkRecord {
    /// Get a preview of the text (first N characters, on a char boundary).
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }

    /// Citation label, e.g. `paper.txt#3`.
    pub fn source_label(&self) -> String {
        format!("{}#{}", self.filename, self.chunk_id)
    }
}
