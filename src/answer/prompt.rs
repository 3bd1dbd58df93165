//! Grounded prompt construction.

use std::fmt::Write;

use crate::retrieve::RetrievalResult;

const INSTRUCTIONS: &str = "You are an assistant that answers questions using the text chunks provided below.
When answering, cite the source chunks using square brackets like [1], [2], etc., matching the numbers assigned in the context.
If the context does not contain the answer, say so.";

/// Build the prompt sent to the language model.
///
/// Context chunks are numbered `[1]..[n]` in retrieval order, so citation
/// `[i]` in the answer refers to `result.hits[i - 1]`.
pub fn build_prompt(question: &str, result: &RetrievalResult) -> String {
    let context_len: usize = result.iter().map(|h| h.chunk.text.len() + 32).sum();
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + question.len() + context_len);

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question.trim());
    prompt.push_str("\n\nContext:\n");

    for hit in result {
        // Writing into a String cannot fail.
        let _ = write!(
            prompt,
            "[{}] (source: {})\n{}\n\n",
            hit.rank,
            hit.chunk.source_label(),
            hit.chunk.text
        );
    }

    prompt.push_str("Answer:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Chunk;
    use crate::retrieve::RetrievedChunk;

    fn hit(rank: usize, text: &str, filename: &str) -> RetrievedChunk {
        RetrievedChunk {
            rank,
            ordinal: rank * 10,
            distance: rank as f32,
            similarity: 0.5,
            chunk: Chunk::new(text, filename, 0, (0, text.len())).record(),
        }
    }

    #[test]
    fn test_context_is_numbered_in_retrieval_order() {
        let result = RetrievalResult {
            hits: vec![
                hit(1, "Transformers use attention.", "paper.txt"),
                hit(2, "RNNs are sequential.", "notes.md"),
            ],
        };
        let prompt = build_prompt("  What do transformers use? ", &result);

        let first = prompt.find("[1] (source: paper.txt#0)\nTransformers use attention.").unwrap();
        let second = prompt.find("[2] (source: notes.md#0)\nRNNs are sequential.").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Question: What do transformers use?\n"));
        assert!(prompt.contains("[1], [2]"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_empty_context_still_asks() {
        let prompt = build_prompt("Anything?", &RetrievalResult::default());
        assert!(prompt.contains("Context:\nAnswer:"));
    }
}
