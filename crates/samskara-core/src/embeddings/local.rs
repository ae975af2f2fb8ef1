//! Local embeddings
//!
//! fastembed (ONNX) running all-MiniLM-L6-v2: 384 dimensions, matching the
//! quantized vector width end to end. The model loads once per process.

use std::sync::{Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::types::{normalize, EMBEDDING_DIM};

use super::{Embedder, EmbedderError};

/// Maximum input length fed to the model; longer payloads truncate
const MAX_TEXT_LEN: usize = 8_192;

static MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Cache directory for model files: `FASTEMBED_CACHE_PATH`, or the
/// platform cache directory
fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(dirs) = directories::ProjectDirs::from("io", "samskara", "mind") {
        return dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbedderError> {
    let result = MODEL.get_or_init(|| {
        let cache = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache) {
            tracing::warn!("could not create fastembed cache dir {:?}: {}", cache, e);
        }
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false)
            .with_cache_dir(cache);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize all-MiniLM-L6-v2: {}", e))
    });
    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbedderError::ModelInit(format!("lock poisoned: {}", e))),
        Err(e) => Err(EmbedderError::ModelInit(e.clone())),
    }
}

/// fastembed-backed implementation of the `Embedder` capability
#[derive(Debug, Default)]
pub struct LocalEmbedder;

impl LocalEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Force model initialization, surfacing any load error early
    pub fn warm_up(&self) -> Result<(), EmbedderError> {
        model().map(|_| ())
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if text.trim().is_empty() {
            return Err(EmbedderError::InvalidInput("empty text".to_string()));
        }
        let truncated: String = text.chars().take(MAX_TEXT_LEN).collect();
        let mut model = model()?;
        let mut vectors = model
            .embed(vec![truncated], None)
            .map_err(|e| EmbedderError::Failed(e.to_string()))?;
        let mut vector = vectors
            .pop()
            .ok_or_else(|| EmbedderError::Failed("model returned no vector".to_string()))?;
        if vector.len() != EMBEDDING_DIM {
            return Err(EmbedderError::Failed(format!(
                "expected {} dimensions, got {}",
                EMBEDDING_DIM,
                vector.len()
            )));
        }
        normalize(&mut vector);
        Ok(vector)
    }
}
