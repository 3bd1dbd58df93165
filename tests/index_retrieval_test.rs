//! End-to-end offline and online phases with a deterministic embedder.

mod common;

use std::sync::Arc;
use std::thread;

use common::{ATTENTION, HashEmbedder, NOTES, RETRIEVAL, write_corpus};
use ragcore::config::Settings;
use ragcore::documents::ChunkingConfig;
use ragcore::embedding::EmbeddingGenerator;
use ragcore::index::{IndexBuilder, Metric, SharedIndex, VectorIndex};
use ragcore::indexing::{IndexingError, IndexingPipeline};
use ragcore::retrieve::{RetrieveError, Retriever};
use tempfile::TempDir;

const DIM: usize = 16;

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.chunking = ChunkingConfig::new(120, 30);
    settings.embedding.batch_size = 5;
    settings
}

fn build_corpus() -> (TempDir, TempDir) {
    let source = TempDir::new().unwrap();
    write_corpus(
        source.path(),
        &[
            ("papers/attention.txt", ATTENTION),
            ("papers/rag.md", RETRIEVAL),
            ("notes.txt", NOTES),
            ("image.png", "not a document"),
        ],
    );
    (source, TempDir::new().unwrap())
}

fn index_corpus() -> (VectorIndex, TempDir) {
    let (source, out) = build_corpus();
    let snapshot = out.path().join("index.json");
    IndexingPipeline::new(&settings(), Arc::new(HashEmbedder::new(DIM)))
        .unwrap()
        .run(source.path(), &snapshot, |_| {})
        .unwrap();
    (VectorIndex::load(&snapshot).unwrap(), out)
}

#[test]
fn test_every_chunk_vector_matches_its_text() {
    let (index, _out) = index_corpus();
    let embedder = HashEmbedder::new(DIM);

    assert!(index.len() > 3);
    let filenames: Vec<&str> = index.records().iter().map(|r| r.filename.as_str()).collect();
    assert!(filenames.contains(&"papers/attention.txt"));
    assert!(filenames.contains(&"papers/rag.md"));
    assert!(!filenames.contains(&"image.png"));

    for (ordinal, record) in index.records().iter().enumerate() {
        assert_eq!(index.vector(ordinal).unwrap(), embedder.vector_for(&record.text).as_slice());
    }
}

#[test]
fn test_exact_chunk_text_retrieves_itself_first() {
    let (index, _out) = index_corpus();
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));

    for (ordinal, record) in index.records().iter().enumerate() {
        let result = retriever.retrieve(&record.text, &index, 3).unwrap();
        assert_eq!(result.hits[0].ordinal, ordinal);
        assert_eq!(result.hits[0].distance, 0.0);
        assert_eq!(result.hits[0].chunk, *record);
    }
}

#[test]
fn test_top_k_matches_brute_force() {
    let (index, _out) = index_corpus();
    let embedder = HashEmbedder::new(DIM);
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));

    for query in ["what is attention", "how are passages cited", "token order"] {
        let q = embedder.vector_for(query);
        let mut expected: Vec<(f32, usize)> = (0..index.len())
            .map(|i| (Metric::L2.distance(&q, index.vector(i).unwrap()), i))
            .collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for k in [1, 2, 4] {
            let result = retriever.retrieve(query, &index, k).unwrap();
            let got: Vec<usize> = result.iter().map(|h| h.ordinal).collect();
            let want: Vec<usize> = expected.iter().take(k).map(|(_, i)| *i).collect();
            assert_eq!(got, want, "query '{query}', k={k}");

            for pair in result.hits.windows(2) {
                assert!(pair[0].distance <= pair[1].distance);
            }
        }
    }
}

#[test]
fn test_top_k_beyond_index_size_returns_all() {
    let (index, _out) = index_corpus();
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));
    let result = retriever.retrieve("attention", &index, index.len() + 25).unwrap();
    assert_eq!(result.len(), index.len());
}

#[test]
fn test_reloaded_index_answers_identically() {
    let (source, out) = build_corpus();
    let snapshot = out.path().join("index.json");
    let embedder: Arc<dyn EmbeddingGenerator> = Arc::new(HashEmbedder::new(DIM));
    let shared = SharedIndex::new();

    IndexingPipeline::new(&settings(), Arc::clone(&embedder))
        .unwrap()
        .rebuild(&shared, source.path(), &snapshot, |_| {})
        .unwrap();

    let in_memory = shared.current().unwrap();
    let reloaded = VectorIndex::load(&snapshot).unwrap();
    assert_eq!(*in_memory, reloaded);

    let retriever = Retriever::new(embedder);
    for query in ["multi-head attention", "dense retriever", "short"] {
        assert_eq!(
            retriever.retrieve(query, &in_memory, 5).unwrap(),
            retriever.retrieve(query, &reloaded, 5).unwrap()
        );
    }
}

#[test]
fn test_concurrent_retrievals_share_one_index() {
    let (index, _out) = index_corpus();
    let index = Arc::new(index);
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));
    let expected = retriever.retrieve("attention subspaces", &index, 4).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let index = Arc::clone(&index);
            let retriever = retriever.clone();
            thread::spawn(move || retriever.retrieve("attention subspaces", &index, 4).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_query_with_wrong_dimension_is_rejected() {
    let (index, _out) = index_corpus();
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM + 1)));
    assert!(matches!(
        retriever.retrieve("attention", &index, 3),
        Err(RetrieveError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_cosine_metric_survives_persistence() {
    let (source, out) = build_corpus();
    let snapshot = out.path().join("cosine.json");
    let mut settings = settings();
    settings.retrieval.metric = Metric::Cosine;

    IndexingPipeline::new(&settings, Arc::new(HashEmbedder::new(DIM)))
        .unwrap()
        .run(source.path(), &snapshot, |_| {})
        .unwrap();

    let index = VectorIndex::load(&snapshot).unwrap();
    assert_eq!(index.metric(), Metric::Cosine);

    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));
    let first = &index.records()[0];
    let result = retriever.retrieve(&first.text, &index, 1).unwrap();
    assert_eq!(result.hits[0].ordinal, 0);
    assert!(result.hits[0].similarity > 0.999);
}

#[test]
fn test_empty_index_is_a_valid_empty_result() {
    let index = IndexBuilder::new().build(Vec::new()).unwrap();
    let retriever = Retriever::new(Arc::new(HashEmbedder::new(DIM)));
    assert!(retriever.retrieve("anything", &index, 5).unwrap().is_empty());
}

#[test]
fn test_invalid_chunking_settings_fail_before_any_work() {
    let mut settings = settings();
    settings.chunking = ChunkingConfig::new(100, 100);
    let result = IndexingPipeline::new(&settings, Arc::new(HashEmbedder::new(DIM)));
    assert!(matches!(result, Err(IndexingError::Chunking(_))));
}
