//! Local sentence-embedding model via fastembed.

use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::{EmbedError, EmbeddingGenerator};
use crate::config::EmbeddingConfig;

/// Embedding generator backed by a fastembed ONNX model.
///
/// The model needs `&mut` access to embed, so calls are serialized through a mutex.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedGenerator {
    /// Create a generator from embedding settings.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let model = parse_model(&config.model)?;
        Self::new(
            model,
            config.effective_cache_dir(),
            config.show_download_progress,
        )
    }

    /// Create a generator for `model`, downloading it into `cache_dir` if needed.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, EmbedError> {
        let model_name = format!("{model:?}");
        tracing::info!(target: "embedding", "loading embedding model {model_name}");

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbedError::ModelInit(e.to_string()))?;

        // Get dimensions by generating a test embedding
        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbedError::ModelInit(e.to_string()))?;
        let dimension = probe.first().map(Vec::len).ok_or_else(|| {
            EmbedError::ModelInit("model returned no vector for the probe text".to_string())
        })?;

        tracing::info!(target: "embedding", "model {model_name} ready ({dimension} dimensions)");

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(inference_error)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// A failed local ONNX run: the model is loaded, so retrying the same input
/// gives the same error.
fn inference_error(err: impl std::fmt::Display) -> EmbedError {
    EmbedError::Inference(err.to_string())
}

/// Resolve a configured model name.
///
/// Accepts fastembed variant names (`AllMiniLML6V2`) as well as the usual
/// Hugging Face ids (`sentence-transformers/all-MiniLM-L6-v2`).
pub fn parse_model(name: &str) -> Result<EmbeddingModel, EmbedError> {
    let normalized: String = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    let model = match normalized.as_str() {
        "allminilml6v2" => EmbeddingModel::AllMiniLML6V2,
        "allminilml12v2" => EmbeddingModel::AllMiniLML12V2,
        "bgesmallenv15" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" => EmbeddingModel::BGELargeENV15,
        "multilinguale5small" => EmbeddingModel::MultilingualE5Small,
        "multilinguale5base" => EmbeddingModel::MultilingualE5Base,
        _ => return Err(EmbedError::UnknownModel(name.to_string())),
    };
    Ok(model)
}
