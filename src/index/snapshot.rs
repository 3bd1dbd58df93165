//! Versioned on-disk snapshot of a [`VectorIndex`].
//!
//! The snapshot is one JSON document holding the chunk arena, the flat
//! vectors, build metadata and a SHA-256 checksum over the payload. Saves are
//! atomic: the new snapshot is written to a temporary file next to the target,
//! synced, and renamed over it.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{FlatVectors, IndexError, IndexMetadata, IndexResult, VectorIndex};
use crate::documents::ChunkRecord;

/// Format tag written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "ragcore-index";

/// Snapshot layout version this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct SnapshotHeader {
    format: String,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format: String,
    version: u32,
    metadata: IndexMetadata,
    checksum: String,
    chunks: Vec<ChunkRecord>,
    vectors: Vec<f32>,
}

fn payload_checksum(chunks: &[ChunkRecord], vectors: &[f32]) -> IndexResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(chunks)?);
    for value in vectors {
        hasher.update(value.to_le_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

impl VectorIndex {
    /// Serialize the index into snapshot bytes.
    pub fn to_snapshot(&self) -> IndexResult<Vec<u8>> {
        let chunks = self.records().to_vec();
        let vectors = self.raw_vectors().to_vec();
        let checksum = payload_checksum(&chunks, &vectors)?;

        let file = SnapshotFile {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            metadata: self.metadata().clone(),
            checksum,
            chunks,
            vectors,
        };
        Ok(serde_json::to_vec(&file)?)
    }

    /// Restore an index from snapshot bytes.
    ///
    /// Rejects foreign files, other layout versions, payloads whose shape
    /// disagrees with the metadata, and checksum mismatches.
    pub fn from_snapshot(bytes: &[u8]) -> IndexResult<Self> {
        let header: SnapshotHeader = serde_json::from_slice(bytes)?;
        if header.format != SNAPSHOT_FORMAT {
            return Err(IndexError::UnsupportedFormat(header.format));
        }
        if header.version != SNAPSHOT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: header.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let file: SnapshotFile = serde_json::from_slice(bytes)?;
        let metadata = file.metadata;

        if file.chunks.len() != metadata.chunk_count {
            return Err(IndexError::Corrupted(format!(
                "metadata lists {} chunks, snapshot holds {}",
                metadata.chunk_count,
                file.chunks.len()
            )));
        }
        let expected_values = metadata
            .chunk_count
            .checked_mul(metadata.dimension)
            .ok_or_else(|| {
                IndexError::Corrupted(format!(
                    "vector shape {} x {} overflows",
                    metadata.chunk_count, metadata.dimension
                ))
            })?;
        if file.vectors.len() != expected_values {
            return Err(IndexError::Corrupted(format!(
                "expected {expected_values} vector values ({} x {}), found {}",
                metadata.chunk_count,
                metadata.dimension,
                file.vectors.len()
            )));
        }
        if metadata.chunk_count > 0 && metadata.dimension == 0 {
            return Err(IndexError::Corrupted(
                "non-empty index with zero dimension".to_string(),
            ));
        }

        let checksum = payload_checksum(&file.chunks, &file.vectors)?;
        if checksum != file.checksum {
            return Err(IndexError::Corrupted(format!(
                "checksum mismatch: stored {}, computed {checksum}",
                file.checksum
            )));
        }

        let vectors = FlatVectors::from_raw(metadata.dimension, file.vectors);
        Ok(VectorIndex::from_parts(file.chunks, vectors, metadata))
    }

    /// Atomically write the snapshot to `path`, creating parent directories.
    ///
    /// Readers of `path` see either the previous snapshot or the new one.
    pub fn save(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let bytes = self.to_snapshot()?;

        let mut temp = tempfile::Builder::new()
            .prefix(".index-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| IndexError::Io(e.error))?;

        crate::log_event!(
            "index",
            "saved snapshot",
            "{} ({} chunks, {} bytes)",
            path.display(),
            self.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Load a snapshot written by [`VectorIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        let index = Self::from_snapshot(&bytes)?;
        tracing::debug!(
            target: "index",
            "loaded snapshot {} ({} chunks, {} dimensions)",
            path.display(),
            index.len(),
            index.dimension()
        );
        Ok(index)
    }
}
