//! Answer generation boundary.
//!
//! Retrieval results are turned into a numbered prompt and handed to a
//! language model through the [`Completion`] trait. The model is an external
//! collaborator: this module only shapes the prompt, calls it, and pairs the
//! reply with the chunks its citations refer to.

mod openai;
mod prompt;

pub use openai::OpenAiCompletion;
pub use prompt::build_prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::index::VectorIndex;
use crate::retrieve::{RetrievalResult, RetrieveError, RetrievedChunk, Retriever};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("Language model unavailable: {0}")]
    Unavailable(String),

    #[error("Language model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected language model response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Classify a non-success HTTP status. Rate limits and server errors are transient.
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 429 || status >= 500 {
            CompletionError::Unavailable(format!("HTTP {status}: {message}"))
        } else {
            CompletionError::Api { status, message }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::Unavailable(_))
    }
}

/// A language model that turns a prompt into text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl AnswerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AnswerError::Retrieve(e) => e.is_retryable(),
            AnswerError::Completion(e) => e.is_retryable(),
        }
    }
}

/// Model reply plus the chunks behind its citations.
///
/// Citation `[i]` in `text` refers to `sources[i - 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Retrieve-then-complete question answering.
pub struct QueryEngine {
    retriever: Retriever,
    completion: Arc<dyn Completion>,
    min_similarity: f32,
}

impl QueryEngine {
    pub fn new(retriever: Retriever, completion: Arc<dyn Completion>) -> Self {
        Self {
            retriever,
            completion,
            min_similarity: f32::NEG_INFINITY,
        }
    }

    /// Drop retrieved chunks scoring below `threshold` before prompting.
    /// Nothing is dropped unless a threshold is set.
    pub fn min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = threshold;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question` from the `top_k` closest chunks of `index`.
    ///
    /// An empty retrieval still reaches the model, with an empty context.
    pub async fn ask(
        &self,
        question: &str,
        index: &VectorIndex,
        top_k: usize,
    ) -> Result<Answer, AnswerError> {
        let context = self.retrieve(question, index, top_k)?;
        self.answer(question, context).await
    }

    /// The context `ask` would cite: the `top_k` closest chunks that reach
    /// the similarity threshold, numbered from 1.
    ///
    /// Embeds the question, so it blocks on the embedding model.
    pub fn retrieve(
        &self,
        question: &str,
        index: &VectorIndex,
        top_k: usize,
    ) -> Result<RetrievalResult, AnswerError> {
        Ok(self
            .retriever
            .retrieve(question, index, top_k)?
            .above_similarity(self.min_similarity))
    }

    /// Complete a prompt built from already retrieved `context`.
    pub async fn answer(
        &self,
        question: &str,
        context: RetrievalResult,
    ) -> Result<Answer, AnswerError> {
        if context.is_empty() {
            tracing::warn!(target: "answer", "no context retrieved, asking without sources");
        }

        let prompt = build_prompt(question, &context);
        let text = self.completion.complete(&prompt).await?;

        tracing::info!(
            target: "answer",
            "answered with {} ({} sources)",
            self.completion.model_name(),
            context.len()
        );

        Ok(Answer {
            text,
            sources: context.hits,
        })
    }
}
