/// Embedder trait and shared types for text embedding.
pub mod download;
pub mod lazy;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{EmbedderBackend, ModelConfig};

use self::lazy::LazyEmbedder;
use self::mock::MockEmbedder;
use self::onnx::OnnxEmbedder;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors, one per input, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Build the configured embedder. Nothing is loaded until the first call.
#[must_use]
pub fn from_config(config: &ModelConfig) -> Arc<dyn Embedder> {
    let dimensions = config.dimensions;
    match config.backend {
        EmbedderBackend::Mock => Arc::new(LazyEmbedder::new(dimensions, move || {
            Ok(Box::new(MockEmbedder::new(dimensions)) as Box<dyn Embedder>)
        })),
        EmbedderBackend::Onnx => {
            let config = config.clone();
            Arc::new(LazyEmbedder::new(dimensions, move || {
                info!("Preparing embedding model {} ({})", config.name, config.repo);
                download::download_model_files(&config.repo, &config.dir)
                    .map_err(|e| EmbedderError::ModelLoadFailed(format!("{e:#}")))?;
                let embedder = OnnxEmbedder::new(&config.dir, config.dimensions, config.batch_size)?;
                Ok(Box::new(embedder) as Box<dyn Embedder>)
            }))
        }
    }
}
