//! Ask command: retrieve context and answer with citations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use super::retrieve::results_table;
use super::{load_embedder, load_index};
use crate::answer::{OpenAiCompletion, QueryEngine};
use crate::config::Settings;
use crate::retrieve::{RetrievalResult, Retriever};

pub struct AskArgs {
    pub question: String,
    pub top_k: Option<usize>,
    pub index: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(args: AskArgs, config: &Settings) -> Result<()> {
    // Fail on a missing key before paying for model load and retrieval.
    let completion = OpenAiCompletion::from_config(&config.completion)?;
    let AskArgs {
        question,
        top_k,
        index,
        json,
    } = args;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    // Model load and query embedding block, keep them off the async workers.
    let settings = config.clone();
    let (engine, question, context) = tokio::task::spawn_blocking(move || -> Result<_> {
        let index = load_index(&settings, index.as_deref())?;
        let retriever = Retriever::new(load_embedder(&settings)?);
        let engine = QueryEngine::new(retriever, Arc::new(completion))
            .min_similarity(settings.retrieval.min_similarity);
        let context = engine.retrieve(&question, &index, top_k)?;
        Ok((engine, question, context))
    })
    .await??;

    let answer = engine.answer(&question, context).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}\n", answer.text.trim());
    if answer.sources.is_empty() {
        eprintln!("No sources were retrieved.");
    } else {
        println!("Sources:");
        let sources = RetrievalResult {
            hits: answer.sources,
        };
        println!("{}", results_table(&sources));
    }
    Ok(())
}
