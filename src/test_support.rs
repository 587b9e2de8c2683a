// Deterministic in-process fakes for the network-facing traits

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::database::lancedb::{ChunkMetadata, DocumentType, RetrievedResult, StoreStats};
use crate::embeddings::{EmbeddingProvider, TextGenerator, validate_embedding_input};
use crate::feedback::{FeedbackSource, FeedbackStats};
use crate::rag::DocumentRetriever;
use crate::{BatchFailure, RagError, Result};

const STOP_WORDS: &[&str] = &["the", "how", "and", "for", "you", "can", "what"];

/// Bag-of-words embedder: texts sharing words get high cosine similarity.
pub struct KeywordEmbedder {
    dimension: usize,
    failing_index: Option<usize>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing_index: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Batch calls fail on the item at `index`; the other items still embed.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.failing_index = Some(index);
        self
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w));

        let mut any = false;
        for word in words {
            vector[bucket(word, self.dimension)] += 1.0;
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

fn bucket(word: &str, dimension: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % dimension as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Validation("cannot embed empty text".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        validate_embedding_input(texts)?;
        let mut vectors = Vec::with_capacity(texts.len());
        let mut failures = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            if self.failing_index == Some(index) {
                failures.push(BatchFailure {
                    index,
                    error: "upstream rejected item".to_string(),
                });
                continue;
            }
            vectors.push(self.embed_one(text).await?);
        }
        if failures.is_empty() {
            Ok(vectors)
        } else {
            Err(RagError::EmbeddingBatch {
                failures,
                total: texts.len(),
            })
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Generator that records prompts and replies with a fixed answer.
pub struct RecordingGenerator {
    reply: String,
    delay: Option<Duration>,
    fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: None,
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying("too late")
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("unused")
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("prompt lock").len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().expect("prompt lock").last().cloned()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt lock")
            .push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RagError::GenerationFailed("model crashed".to_string()));
        }
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "recording-test"
    }
}

/// Retriever returning canned results and recording every call.
pub struct ScriptedRetriever {
    results: Vec<RetrievedResult>,
    fail: bool,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedRetriever {
    pub fn with_scores(scores: &[f32]) -> Self {
        Self {
            results: scores
                .iter()
                .enumerate()
                .map(|(i, score)| retrieved(&format!("Chunk number {} about applying for jobs.", i), *score))
                .collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(results: Vec<RetrievedResult>) -> Self {
        Self {
            results,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn last_call(&self) -> Option<(String, usize)> {
        self.calls.lock().expect("calls lock").last().cloned()
    }
}

#[async_trait]
impl DocumentRetriever for ScriptedRetriever {
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((query.to_string(), top_k));
        if self.fail {
            return Err(RagError::RetrievalFailed("store unreachable".to_string()));
        }
        Ok(self.results.iter().take(top_k).cloned().collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        if self.fail {
            return Err(RagError::Database("store unreachable".to_string()));
        }
        Ok(StoreStats {
            count: self.results.len(),
            collection_name: "scripted".to_string(),
            embedding_model: "keyword-test".to_string(),
            embedding_dimension: 8,
        })
    }
}

pub fn retrieved(text: &str, score: f32) -> RetrievedResult {
    RetrievedResult {
        id: format!("id-{}", score),
        text: text.to_string(),
        metadata: ChunkMetadata {
            id: None,
            source: "applying.md".to_string(),
            file_path: "docs/applying.md".to_string(),
            chunk_index: 0,
            total_chunks: 1,
            document_type: DocumentType::Markdown,
            processed_at: chrono::Utc::now(),
        },
        distance: 1.0 - score,
        score,
    }
}

/// Feedback source answering from a queue of canned stats.
pub struct CannedFeedback {
    stats: Mutex<VecDeque<Result<FeedbackStats>>>,
    pub lookups: AtomicUsize,
}

impl CannedFeedback {
    pub fn new(stats: Vec<Result<FeedbackStats>>) -> Self {
        Self {
            stats: Mutex::new(stats.into()),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FeedbackSource for CannedFeedback {
    async fn family_stats(&self, _query: &str, _window_days: u32) -> Result<FeedbackStats> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.stats
            .lock()
            .expect("stats lock")
            .pop_front()
            .unwrap_or_else(|| Ok(FeedbackStats::default()))
    }
}
