// LanceDB vector database module
// Handles chunk storage and similarity search for embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{RagError, Result};

pub use vector_store::VectorStore;

/// Source format of an ingested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Text,
}

impl DocumentType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }

    /// Map a file extension (without the dot) to a supported document type
    #[inline]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = RagError;

    #[inline]
    fn from_str(value: &str) -> Result<Self> {
        match value {
            "markdown" => Ok(Self::Markdown),
            "text" => Ok(Self::Text),
            other => Err(RagError::Validation(format!(
                "unknown document type: {}",
                other
            ))),
        }
    }
}

/// Metadata carried by every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Caller-supplied record id; a UUID is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// File name of the source document
    pub source: String,
    pub file_path: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub document_type: DocumentType,
    pub processed_at: DateTime<Utc>,
}

/// A bounded span of source text plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Check the invariants the store relies on before embedding
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(RagError::Validation(format!(
                "chunk {} of {} has empty text",
                self.metadata.chunk_index, self.metadata.source
            )));
        }
        if self.metadata.source.trim().is_empty() {
            return Err(RagError::Validation(
                "chunk metadata is missing its source".to_string(),
            ));
        }
        if self.metadata.chunk_index >= self.metadata.total_chunks {
            return Err(RagError::Validation(format!(
                "chunk index {} out of range for {} chunks in {}",
                self.metadata.chunk_index, self.metadata.total_chunks, self.metadata.source
            )));
        }
        Ok(())
    }
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedResult {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
    /// `1 - distance`; higher is more similar
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub count: usize,
    pub collection_name: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}
