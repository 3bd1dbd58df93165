//! Document chunking strategies.
//!
//! Provides the `Chunker` trait and a recursive-separator implementation for
//! splitting documents into overlapping chunks suitable for embedding.

use std::collections::VecDeque;

use thiserror::Error;

use super::config::{ChunkingConfig, DEFAULT_SEPARATORS};
use super::types::{Chunk, Document};

/// Errors raised when a chunker cannot be constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfig(String),
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split one document into chunks numbered from 0.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split documents in input order; all chunks of document `i` precede
    /// those of document `i + 1`.
    fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }
}

/// Split `documents` with the default separators.
pub fn chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let chunker = RecursiveChunker::new(ChunkingConfig::new(chunk_size, chunk_overlap))?;
    Ok(chunker.chunk_documents(documents))
}

/// Recursive separator chunker.
///
/// Algorithm:
/// 1. Pick the first separator (paragraph, line, period, space, character)
///    that occurs in the text
/// 2. Split there, keeping the separator at the start of the following piece
/// 3. Merge runs of pieces that fit into chunks of at most `chunk_size`,
///    carrying up to `chunk_overlap` trailing characters into the next chunk
/// 4. Recurse with the remaining separators on pieces that are still too large
///
/// Every chunk is an exact slice of the source, so byte ranges of adjacent
/// chunks either touch or overlap.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkingConfig,
}

/// A contiguous span of the source text.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

impl RecursiveChunker {
    /// Create a chunker, rejecting `chunk_overlap >= chunk_size`.
    pub fn new(config: ChunkingConfig) -> Result<Self, ChunkingError> {
        config.validate().map_err(ChunkingError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Compute chunk byte ranges for `text`.
    pub fn split_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        if text.is_empty() {
            return out;
        }
        self.split_recursive(text, (0, text.len()), &DEFAULT_SEPARATORS, &mut out);
        out
    }

    fn split_recursive(
        &self,
        text: &str,
        range: (usize, usize),
        separators: &[&str],
        out: &mut Vec<(usize, usize)>,
    ) {
        let slice = &text[range.0..range.1];

        let (separator, remaining): (&str, &[&str]) = match separators
            .iter()
            .position(|sep| sep.is_empty() || slice.contains(sep))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[]),
        };

        let mut run: Vec<Piece> = Vec::new();
        for piece in split_keep_start(slice, separator, range.0) {
            if piece.chars <= self.config.chunk_size {
                run.push(piece);
                continue;
            }

            if !run.is_empty() {
                self.merge(&run, out);
                run.clear();
            }

            if remaining.is_empty() {
                // Only reachable for a single character wider than the limit
                out.push((piece.start, piece.end));
            } else {
                self.split_recursive(text, (piece.start, piece.end), remaining, out);
            }
        }

        if !run.is_empty() {
            self.merge(&run, out);
        }
    }

    /// Greedily pack pieces into chunks with overlap.
    fn merge(&self, pieces: &[Piece], out: &mut Vec<(usize, usize)>) {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if total + piece.chars > size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    out.push((first.start, last.end));
                }

                // Keep at most `overlap` trailing characters, and only as many
                // as still leave room for the incoming piece
                while total > overlap || (total > 0 && total + piece.chars > size) {
                    let Some(dropped) = window.pop_front() else {
                        break;
                    };
                    total -= dropped.chars;
                }
            }

            window.push_back(piece);
            total += piece.chars;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            out.push((first.start, last.end));
        }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.is_blank() {
            tracing::debug!(target: "chunker", "skipping blank document {}", document.filename);
            return Vec::new();
        }

        let chunks: Vec<Chunk> = self
            .split_ranges(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                Chunk::new(
                    &document.text[start..end],
                    document.filename.as_str(),
                    i as u32,
                    (start, end),
                )
            })
            .collect();

        tracing::debug!(
            target: "chunker",
            "{} -> {} chunks (size={}, overlap={})",
            document.filename,
            chunks.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        chunks
    }
}

/// Split `slice` at every occurrence of `separator`, attaching the separator
/// to the start of the piece that follows it. An empty separator splits into
/// characters. Offsets are shifted by `offset` into the full document.
fn split_keep_start(slice: &str, separator: &str, offset: usize) -> Vec<Piece> {
    let piece = |start: usize, end: usize| Piece {
        start: offset + start,
        end: offset + end,
        chars: slice[start..end].chars().count(),
    };

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| piece(i, i + c.len_utf8()))
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in slice.match_indices(separator) {
        if pos > start {
            pieces.push(piece(start, pos));
        }
        start = pos;
    }
    if start < slice.len() {
        pieces.push(piece(start, slice.len()));
    }
    pieces
}
