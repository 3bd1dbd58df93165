//! Chunker properties checked over many generated documents.

use ragcore::documents::{
    Chunk, Chunker, ChunkingConfig, ChunkingError, Document, RecursiveChunker, chunk_documents,
};

/// Small deterministic generator so failures reproduce exactly.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> usize {
        (self.next() % n) as usize
    }
}

const WORDS: &[&str] = &[
    "attention", "is", "all", "you", "need", "retrieval", "augmented", "generation", "vector",
    "index", "a", "the", "of", "über", "naïve", "日本語", "données", "x",
];

fn generate_text(rng: &mut Lcg) -> String {
    let mut text = String::new();
    let paragraphs = 1 + rng.below(4);
    for p in 0..paragraphs {
        if p > 0 {
            text.push_str("\n\n");
        }
        let sentences = 1 + rng.below(6);
        for s in 0..sentences {
            if s > 0 {
                text.push_str(if rng.below(4) == 0 { "\n" } else { " " });
            }
            let words = 1 + rng.below(12);
            for w in 0..words {
                if w > 0 {
                    text.push(' ');
                }
                if rng.below(15) == 0 {
                    // unbroken run that forces the character fallback
                    text.push_str(&"z".repeat(5 + rng.below(60)));
                } else {
                    text.push_str(WORDS[rng.below(WORDS.len() as u64)]);
                }
            }
            text.push('.');
        }
    }
    text
}

fn check_properties(doc: &Document, chunks: &[Chunk], config: &ChunkingConfig) {
    let text = doc.text.as_str();
    assert!(!chunks.is_empty(), "non-blank text produced no chunks");

    for (i, chunk) in chunks.iter().enumerate() {
        let (start, end) = chunk.byte_range;
        assert_eq!(chunk.chunk_id, i as u32);
        assert_eq!(chunk.filename, doc.filename);
        assert_eq!(&text[start..end], chunk.text, "chunk is not an exact slice");
        assert!(
            chunk.char_count() <= config.chunk_size,
            "chunk of {} chars exceeds {}",
            chunk.char_count(),
            config.chunk_size
        );
    }

    assert_eq!(chunks[0].byte_range.0, 0);
    assert_eq!(chunks[chunks.len() - 1].byte_range.1, text.len());

    let mut rebuilt = chunks[0].text.clone();
    for pair in chunks.windows(2) {
        let (prev, next) = (pair[0].byte_range, pair[1].byte_range);
        assert!(next.0 > prev.0, "chunks must advance");
        assert!(next.0 <= prev.1, "gap between chunks");
        assert!(next.1 > prev.1, "chunk adds no new text");

        let overlap = text[next.0..prev.1].chars().count();
        assert!(
            overlap <= config.chunk_overlap,
            "overlap of {overlap} chars exceeds {}",
            config.chunk_overlap
        );
        rebuilt.push_str(&text[prev.1..next.1]);
    }
    assert_eq!(rebuilt, text, "non-overlapping parts must reconstruct the document");
}

#[test]
fn test_properties_hold_for_generated_documents() {
    let mut rng = Lcg(0x5eed);
    let configs = [
        ChunkingConfig::new(1000, 200),
        ChunkingConfig::new(120, 30),
        ChunkingConfig::new(40, 10),
        ChunkingConfig::new(17, 16),
        ChunkingConfig::new(8, 0),
        ChunkingConfig::new(1, 0),
    ];

    for round in 0..60 {
        let doc = Document::new(format!("doc-{round}.txt"), generate_text(&mut rng));
        for config in &configs {
            let chunker = RecursiveChunker::new(config.clone()).unwrap();
            let chunks = chunker.chunk(&doc);
            check_properties(&doc, &chunks, config);
        }
    }
}

#[test]
fn test_chunking_is_deterministic() {
    let mut rng = Lcg(42);
    let docs: Vec<Document> = (0..10)
        .map(|i| Document::new(format!("d{i}.md"), generate_text(&mut rng)))
        .collect();

    let first = chunk_documents(&docs, 50, 12).unwrap();
    let second = chunk_documents(&docs, 50, 12).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_output_follows_document_order() {
    let docs = vec![
        Document::new("z.txt", "zeta ".repeat(30)),
        Document::new("a.txt", "alpha ".repeat(30)),
    ];
    let chunks = chunk_documents(&docs, 40, 5).unwrap();

    let first_a = chunks.iter().position(|c| c.filename == "a.txt").unwrap();
    assert!(chunks[..first_a].iter().all(|c| c.filename == "z.txt"));
    assert!(chunks[first_a..].iter().all(|c| c.filename == "a.txt"));
}

#[test]
fn test_sentence_example() {
    let chunks = chunk_documents(&[Document::new("abc.txt", "A. B. C.")], 4, 1).unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["A. B", ". C."]);
}

#[test]
fn test_small_document_is_one_chunk() {
    let text = "Exactly one chunk.\n\nEven with paragraphs.";
    let chunks = chunk_documents(&[Document::new("s.txt", text)], text.chars().count(), 3).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
}

#[test]
fn test_empty_inputs() {
    assert!(chunk_documents(&[], 1000, 200).unwrap().is_empty());
    assert!(chunk_documents(&[Document::new("e.txt", "")], 1000, 200).unwrap().is_empty());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let docs = [Document::new("a.txt", "text")];
    assert!(matches!(
        chunk_documents(&docs, 100, 100),
        Err(ChunkingError::InvalidConfig(_))
    ));
    assert!(matches!(
        chunk_documents(&docs, 100, 150),
        Err(ChunkingError::InvalidConfig(_))
    ));
    assert!(matches!(
        chunk_documents(&docs, 0, 0),
        Err(ChunkingError::InvalidConfig(_))
    ));
}
