// Embedding and text generation services plus document chunking

pub mod chunking;
pub mod ollama;

use std::time::Duration;

use async_trait::async_trait;

use crate::{RagError, Result};

pub use chunking::{ChunkingConfig, TextSegmenter, split_text};
pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed every text in order. Failures are reported per index.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Black-box text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Run a generation call that is abandoned once `deadline` elapses.
///
/// The underlying call is dropped on timeout and never awaited again.
#[inline]
pub async fn generate_with_deadline(
    generator: &dyn TextGenerator,
    prompt: &str,
    deadline: Duration,
) -> Result<String> {
    tokio::time::timeout(deadline, generator.generate(prompt))
        .await
        .map_err(|_| RagError::GenerationTimeout(deadline))?
}

/// Reject empty or whitespace-only inputs before any network call.
#[inline]
pub fn validate_embedding_input(texts: &[String]) -> Result<()> {
    let empty: Vec<usize> = texts
        .iter()
        .enumerate()
        .filter(|(_, text)| text.trim().is_empty())
        .map(|(index, _)| index)
        .collect();

    if empty.is_empty() {
        Ok(())
    } else {
        Err(RagError::Validation(format!(
            "cannot embed empty text (indices {:?})",
            empty
        )))
    }
}

/// Fail fast when a vector does not have the expected dimension.
#[inline]
pub fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(RagError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}
