//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use ragcore::embedding::{EmbedError, EmbeddingGenerator};
use sha2::{Digest, Sha256};

/// Deterministic embedder: the vector is derived from a SHA-256 of the text,
/// so identical text always maps to the identical vector.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimension)
            .map(|i| f32::from(digest[i % digest.len()]) / 255.0 - 0.5)
            .collect()
    }
}

impl EmbeddingGenerator for HashEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Write `files` (relative name, contents) under `root`.
pub fn write_corpus(root: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

pub const ATTENTION: &str = "The Transformer relies entirely on attention.\n\nSelf-attention relates different positions of a single sequence in order to compute a representation of the sequence. Multi-head attention lets the model jointly attend to information from different representation subspaces.\n\nPositional encodings inject information about token order, since the model contains no recurrence and no convolution.";

pub const RETRIEVAL: &str = "Retrieval-augmented generation combines a parametric language model with a non-parametric memory. A dense retriever selects passages, and the generator conditions on them.\nThe retrieved passages are cited so that readers can verify the answer.";

pub const NOTES: &str = "Short note.";
