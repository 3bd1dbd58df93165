//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod ask;
pub mod index;
pub mod init;
pub mod retrieve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::embedding::{EmbeddingGenerator, FastEmbedGenerator};
use crate::index::VectorIndex;

/// Load the configured embedding model.
pub(crate) fn load_embedder(config: &Settings) -> Result<Arc<dyn EmbeddingGenerator>> {
    let generator = FastEmbedGenerator::from_config(&config.embedding)
        .with_context(|| format!("failed to load embedding model '{}'", config.embedding.model))?;
    Ok(Arc::new(generator))
}

/// Load the snapshot at `path`, or at the configured location.
pub(crate) fn load_index(config: &Settings, path: Option<&Path>) -> Result<VectorIndex> {
    let path: PathBuf = path.map_or_else(|| config.resolved_index_path(), Path::to_path_buf);
    if !path.exists() {
        anyhow::bail!(
            "No index found at {}. Run 'ragcore index <DIR>' first.",
            path.display()
        );
    }
    VectorIndex::load(&path).with_context(|| format!("failed to load index {}", path.display()))
}
