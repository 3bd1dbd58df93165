//! Source document discovery and loading.
//!
//! Walks a directory with the same rules the rest of the tooling uses:
//! - .gitignore rules
//! - Include patterns from configuration (default `**/*.txt`, `**/*.md`)
//! - Custom ignore patterns from configuration
//!
//! Unreadable files are data errors: they are reported and skipped, never fatal.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use serde::Serialize;
use thiserror::Error;

use super::types::Document;
use crate::config::DocumentsConfig;

/// Errors that abort loading as a whole.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source directory not found: {0}")]
    MissingRoot(PathBuf),

    #[error("Invalid document pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A document that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub filename: String,
    pub reason: String,
}

/// Documents loaded from a directory plus those that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

/// Loads text documents from a directory tree.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    config: DocumentsConfig,
}

impl DocumentLoader {
    pub fn new(config: DocumentsConfig) -> Self {
        Self { config }
    }

    /// Load all matching documents under `root`, sorted by filename.
    pub fn load_dir(&self, root: &Path) -> Result<LoadOutcome, LoadError> {
        if !root.is_dir() {
            return Err(LoadError::MissingRoot(root.to_path_buf()));
        }

        let (paths, unreadable) = self.discover(root)?;
        let mut outcome = LoadOutcome {
            skipped: unreadable,
            ..LoadOutcome::default()
        };
        for path in paths {
            let filename = relative_name(root, &path);
            match self.read_text(&path) {
                Ok(text) => outcome.documents.push(Document::new(filename, text)),
                Err(reason) => {
                    tracing::warn!(target: "loader", "skipping {filename}: {reason}");
                    outcome.skipped.push(SkippedDocument { filename, reason });
                }
            }
        }

        outcome.documents.sort_by(|a, b| a.filename.cmp(&b.filename));
        outcome.skipped.sort_by(|a, b| a.filename.cmp(&b.filename));

        tracing::info!(
            target: "loader",
            "loaded {} documents from {} ({} skipped)",
            outcome.documents.len(),
            root.display(),
            outcome.skipped.len()
        );

        Ok(outcome)
    }

    /// Paths of files that would be loaded from `root`, plus the parts of
    /// the tree that could not be walked.
    pub fn discover(
        &self,
        root: &Path,
    ) -> Result<(Vec<PathBuf>, Vec<SkippedDocument>), LoadError> {
        let mut override_builder = OverrideBuilder::new(root);
        for pattern in &self.config.patterns {
            override_builder
                .add(pattern)
                .map_err(|e| LoadError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
        }
        for pattern in &self.config.ignore_patterns {
            // Exclusion patterns are prefixed with !
            override_builder
                .add(&format!("!{pattern}"))
                .map_err(|e| LoadError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
        }
        let overrides = override_builder
            .build()
            .map_err(|e| LoadError::InvalidPattern {
                pattern: self.config.patterns.join(", "),
                reason: e.to_string(),
            })?;

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true) // Skip hidden files and directories
            .git_ignore(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .overrides(overrides);

        let mut paths = Vec::new();
        let mut unreadable = Vec::new();
        for entry in builder.build() {
            match entry {
                Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                    paths.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => {
                    let filename = error_path(&e)
                        .map(|path| relative_name(root, path))
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| ".".to_string());
                    tracing::warn!(target: "loader", "skipping {filename}: {e}");
                    unreadable.push(SkippedDocument {
                        filename,
                        reason: format!("cannot walk: {e}"),
                    });
                }
            }
        }

        paths.sort();
        Ok((paths, unreadable))
    }

    fn read_text(&self, path: &Path) -> Result<String, String> {
        let metadata = std::fs::metadata(path).map_err(|e| format!("cannot stat file: {e}"))?;
        if metadata.len() > self.config.max_file_bytes {
            return Err(format!(
                "file is {} bytes, limit is {}",
                metadata.len(),
                self.config.max_file_bytes
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| format!("cannot read file: {e}"))?;
        String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))
    }
}

/// The path a walk error refers to, if it names one.
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
