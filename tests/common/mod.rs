// Deterministic fakes shared by the integration tests

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docs_rag::database::lancedb::{RetrievedResult, StoreStats};
use docs_rag::embeddings::{EmbeddingProvider, TextGenerator, validate_embedding_input};
use docs_rag::rag::DocumentRetriever;
use docs_rag::{RagError, Result};

const IGNORED_WORDS: &[&str] = &["the", "how", "and", "for", "you", "can", "what"];

/// Hashes words into buckets so texts sharing words score high
pub struct BagOfWordsEmbedder {
    dimension: usize,
}

impl BagOfWordsEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        let mut any = false;
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !IGNORED_WORDS.contains(w))
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in word.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
            any = true;
        }
        if !any {
            vector[0] = 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|v| *v /= norm);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Validation("cannot embed empty text".to_string()));
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        validate_embedding_input(texts)?;
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

/// Generator with a fixed reply that counts its calls
pub struct FixedGenerator {
    reply: String,
    pub calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Wraps a retriever and records every search it forwards
pub struct RecordingRetriever<R> {
    inner: R,
    pub searches: Mutex<Vec<(String, usize)>>,
}

impl<R> RecordingRetriever<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn searches(&self) -> Vec<(String, usize)> {
        self.searches.lock().expect("searches lock").clone()
    }
}

#[async_trait]
impl<R: DocumentRetriever> DocumentRetriever for RecordingRetriever<R> {
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        self.searches
            .lock()
            .expect("searches lock")
            .push((query.to_string(), top_k));
        self.inner.similarity_search(query, top_k).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }
}
