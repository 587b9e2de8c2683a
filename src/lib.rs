use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Message shown to end users for any failure that is not their fault.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// Message shown to end users when generation exceeded its deadline.
pub const GENERATION_TIMEOUT_MESSAGE: &str =
    "The assistant took too long to respond. Please try again.";

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Vector store not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Failed to embed {} of {total} texts", failures.len())]
    EmbeddingBatch {
        failures: Vec<BatchFailure>,
        total: usize,
    },

    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// One failed item of a batch embedding call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

impl RagError {
    /// Errors the caller can fix by changing their input.
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::EmptyInput(_))
    }

    /// Text safe to show to an end user. Upstream details stay in the logs.
    #[inline]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::EmptyInput(message) => message.clone(),
            Self::GenerationTimeout(_) => GENERATION_TIMEOUT_MESSAGE.to_string(),
            _ => SERVICE_UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod feedback;
pub mod indexer;
pub mod mcp;
pub mod rag;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;
