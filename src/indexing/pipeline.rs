use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use super::{IndexProgress, IndexingError, IndexingReport, StageTimings};
use crate::config::Settings;
use crate::documents::{Chunk, Chunker, DocumentLoader, RecursiveChunker, SkippedDocument};
use crate::embedding::{EmbeddingGenerator, embed_chunks};
use crate::index::{IndexBuilder, Metric, SharedIndex, VectorIndex};

const DEFAULT_BATCH_SIZE: usize = 64;

/// A built index plus everything the report needs except the save step.
struct Built {
    index: VectorIndex,
    documents_indexed: usize,
    skipped: Vec<SkippedDocument>,
    timings: StageTimings,
}

/// Orchestrates the offline phase.
///
/// The embedder is injected so one model instance can be shared with the
/// query side and tests can use a deterministic stub.
pub struct IndexingPipeline {
    loader: DocumentLoader,
    chunker: RecursiveChunker,
    embedder: Arc<dyn EmbeddingGenerator>,
    batch_size: usize,
    metric: Metric,
}

impl IndexingPipeline {
    /// Create a pipeline from settings. Invalid chunking parameters fail here.
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, IndexingError> {
        let chunker = RecursiveChunker::new(settings.chunking.clone())?;
        Ok(Self::with_parts(
            DocumentLoader::new(settings.documents.clone()),
            chunker,
            embedder,
        )
        .batch_size(settings.embedding.batch_size)
        .metric(settings.retrieval.metric))
    }

    pub fn with_parts(
        loader: DocumentLoader,
        chunker: RecursiveChunker,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            metric: Metric::default(),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Index `source_dir` and atomically replace the snapshot at `snapshot_path`.
    ///
    /// Nothing is written unless every stage succeeds.
    pub fn run<F>(
        &self,
        source_dir: &Path,
        snapshot_path: &Path,
        mut on_progress: F,
    ) -> Result<IndexingReport, IndexingError>
    where
        F: FnMut(IndexProgress),
    {
        let start = Instant::now();
        let built = self.build(source_dir, &mut on_progress)?;
        let (report, _) = self.save(built, snapshot_path, start, &mut on_progress)?;
        Ok(report)
    }

    /// Like [`IndexingPipeline::run`], then publish the new index to `shared`.
    ///
    /// Queries keep hitting the previous index until the new one is saved.
    /// A failed run leaves `shared` as it was.
    pub fn rebuild<F>(
        &self,
        shared: &SharedIndex,
        source_dir: &Path,
        snapshot_path: &Path,
        mut on_progress: F,
    ) -> Result<IndexingReport, IndexingError>
    where
        F: FnMut(IndexProgress),
    {
        let start = Instant::now();
        let guard = shared.begin_rebuild()?;
        let built = self.build(source_dir, &mut on_progress)?;
        let (report, index) = self.save(built, snapshot_path, start, &mut on_progress)?;
        guard.publish(index);
        Ok(report)
    }

    fn build<F>(&self, source_dir: &Path, on_progress: &mut F) -> Result<Built, IndexingError>
    where
        F: FnMut(IndexProgress),
    {
        let mut timings = StageTimings::default();

        let stage = Instant::now();
        let outcome = self.loader.load_dir(source_dir)?;
        let mut skipped = outcome.skipped;
        timings.load = stage.elapsed();
        on_progress(IndexProgress::Loaded {
            documents: outcome.documents.len(),
            skipped: skipped.len(),
        });

        let stage = Instant::now();
        let per_document: Vec<Vec<Chunk>> = outcome
            .documents
            .par_iter()
            .map(|doc| self.chunker.chunk(doc))
            .collect();

        let mut documents_indexed = 0;
        for (doc, chunks) in outcome.documents.iter().zip(&per_document) {
            if chunks.is_empty() {
                tracing::warn!(target: "pipeline", "{} has no text, skipping", doc.filename);
                skipped.push(SkippedDocument {
                    filename: doc.filename.clone(),
                    reason: "document has no text".to_string(),
                });
            } else {
                documents_indexed += 1;
            }
        }
        skipped.sort_by(|a, b| a.filename.cmp(&b.filename));

        let chunks: Vec<Chunk> = per_document.into_iter().flatten().collect();
        timings.chunk = stage.elapsed();
        on_progress(IndexProgress::Chunked {
            chunks: chunks.len(),
        });

        if chunks.is_empty() {
            return Err(IndexingError::EmptyCorpus { skipped });
        }

        tracing::info!(
            target: "pipeline",
            "embedding {} chunks from {documents_indexed} documents with {}",
            chunks.len(),
            self.embedder.model_name()
        );

        let stage = Instant::now();
        let embedded = embed_chunks(chunks, self.embedder.as_ref(), self.batch_size, |done, total| {
            on_progress(IndexProgress::Embedding { done, total })
        })?;
        timings.embed = stage.elapsed();

        let stage = Instant::now();
        let index = IndexBuilder::new()
            .metric(self.metric)
            .embedding_model(self.embedder.model_name())
            .chunking(self.chunker.config().clone())
            .build(embedded)?;
        timings.build = stage.elapsed();
        on_progress(IndexProgress::Built {
            chunks: index.len(),
            dimension: index.dimension(),
        });

        Ok(Built {
            index,
            documents_indexed,
            skipped,
            timings,
        })
    }

    fn save<F>(
        &self,
        built: Built,
        snapshot_path: &Path,
        start: Instant,
        on_progress: &mut F,
    ) -> Result<(IndexingReport, VectorIndex), IndexingError>
    where
        F: FnMut(IndexProgress),
    {
        let Built {
            index,
            documents_indexed,
            skipped,
            mut timings,
        } = built;

        let stage = Instant::now();
        index.save(snapshot_path)?;
        timings.save = stage.elapsed();
        on_progress(IndexProgress::Saved {
            path: snapshot_path.to_path_buf(),
        });

        let report = IndexingReport {
            documents_indexed,
            chunks_indexed: index.len(),
            dimension: index.dimension(),
            skipped,
            snapshot_path: snapshot_path.to_path_buf(),
            elapsed: start.elapsed(),
            timings,
        };

        tracing::info!(
            target: "pipeline",
            "indexed {} chunks from {} documents in {:.2}s ({} skipped)",
            report.chunks_indexed,
            report.documents_indexed,
            report.elapsed.as_secs_f64(),
            report.skipped.len()
        );

        Ok((report, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentsConfig;
    use crate::documents::ChunkingConfig;
    use crate::embedding::testing::StubEmbedder;
    use crate::index::IndexState;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(embedder: StubEmbedder) -> IndexingPipeline {
        IndexingPipeline::with_parts(
            DocumentLoader::new(DocumentsConfig::default()),
            RecursiveChunker::new(ChunkingConfig::new(40, 10)).unwrap(),
            Arc::new(embedder),
        )
        .batch_size(4)
    }

    fn corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("attention.txt"),
            "Transformers rely on attention.\n\n\
             Attention weighs every token against every other token.",
        )
        .unwrap();
        fs::write(dir.path().join("blank.md"), "   \n").unwrap();
        fs::write(dir.path().join("cats.md"), "Cats sleep most of the day.").unwrap();
        dir
    }

    #[test]
    fn test_run_writes_snapshot_and_reports() {
        let source = corpus();
        let out = TempDir::new().unwrap();
        let snapshot = out.path().join("index.json");

        let mut events = Vec::new();
        let report = pipeline(StubEmbedder::new(8))
            .run(source.path(), &snapshot, |p| events.push(p))
            .unwrap();

        assert_eq!(report.documents_indexed, 2);
        assert!(report.chunks_indexed >= 3);
        assert_eq!(report.dimension, 8);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].filename, "blank.md");

        let index = VectorIndex::load(&snapshot).unwrap();
        assert_eq!(index.len(), report.chunks_indexed);
        assert_eq!(index.metadata().embedding_model.as_deref(), Some("stub"));
        assert_eq!(index.metadata().chunking, Some(ChunkingConfig::new(40, 10)));

        assert!(matches!(events.first(), Some(IndexProgress::Loaded { documents: 3, skipped: 0 })));
        assert!(matches!(events.last(), Some(IndexProgress::Saved { .. })));
    }

    #[test]
    fn test_embeddings_follow_chunks() {
        let source = corpus();
        let out = TempDir::new().unwrap();
        let snapshot = out.path().join("index.json");
        pipeline(StubEmbedder::new(8))
            .run(source.path(), &snapshot, |_| {})
            .unwrap();

        let index = VectorIndex::load(&snapshot).unwrap();
        for (ordinal, record) in index.records().iter().enumerate() {
            assert_eq!(
                index.vector(ordinal).unwrap(),
                StubEmbedder::hash_vector(&record.text, 8).as_slice()
            );
        }
    }

    #[test]
    fn test_empty_corpus_keeps_existing_snapshot() {
        let out = TempDir::new().unwrap();
        let snapshot = out.path().join("index.json");
        pipeline(StubEmbedder::new(8))
            .run(corpus().path(), &snapshot, |_| {})
            .unwrap();
        let before = fs::read(&snapshot).unwrap();

        let empty = TempDir::new().unwrap();
        fs::write(empty.path().join("only.txt"), "").unwrap();
        let err = pipeline(StubEmbedder::new(8))
            .run(empty.path(), &snapshot, |_| {})
            .unwrap_err();

        match err {
            IndexingError::EmptyCorpus { skipped } => assert_eq!(skipped[0].filename, "only.txt"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(&snapshot).unwrap(), before);
    }

    #[test]
    fn test_unavailable_embedder_writes_nothing() {
        let out = TempDir::new().unwrap();
        let snapshot = out.path().join("index.json");
        let err = pipeline(StubEmbedder::new(8).failing_after(1))
            .run(corpus().path(), &snapshot, |_| {})
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(!snapshot.exists());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rebuild_publishes_to_shared_index() {
        let out = TempDir::new().unwrap();
        let snapshot = out.path().join("index.json");
        let shared = SharedIndex::new();

        pipeline(StubEmbedder::new(8))
            .rebuild(&shared, corpus().path(), &snapshot, |_| {})
            .unwrap();
        assert_eq!(shared.state(), IndexState::Ready);
        let first = shared.current().unwrap();

        let failed = pipeline(StubEmbedder::new(8).failing_after(0)).rebuild(
            &shared,
            corpus().path(),
            &snapshot,
            |_| {},
        );
        assert!(failed.is_err());
        assert_eq!(shared.state(), IndexState::Ready);
        assert!(Arc::ptr_eq(&first, &shared.current().unwrap()));
    }
}
