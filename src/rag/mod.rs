// Retrieval-augmented answering: cache, strategy selection, retrieval,
// threshold filtering, prompt assembly and generation under a deadline.


pub mod cache;
pub mod prompt;
pub mod strategy;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::lancedb::{DocumentType, RetrievedResult, StoreStats};
use crate::embeddings::{TextGenerator, generate_with_deadline};
use crate::feedback::{FeedbackConfig, FeedbackSource};
use crate::{RagError, Result};

pub use cache::{CachedAnswer, ResponseCache};
pub use strategy::{RetrievalStrategy, StrategyKind, StrategyReason};

/// Canned reply when no stored chunk is relevant enough to answer from.
pub const INSUFFICIENT_KNOWLEDGE_MESSAGE: &str = "I don't have enough information in my knowledge base to answer that specific question. I can help with questions about the platform's features, job matching, application tracking and account settings. Could you rephrase your question or ask about something else?";

const CITATION_PREVIEW_CHARS: usize = 200;

/// Nearest-neighbour search over stored chunks.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Results arrive sorted by descending score.
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>>;

    async fn stats(&self) -> Result<StoreStats>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub retrieval_count: usize,
    pub similarity_threshold: f32,
    pub max_conversation_history: usize,
    pub generation_timeout_secs: u64,
    pub cache_capacity: usize,
    /// Queries with at most this many words may be treated as small talk
    pub small_talk_max_words: usize,
    /// Best raw score below which a short query is treated as small talk
    pub small_talk_max_score: f32,
    /// Product name used in prompts
    pub assistant_name: String,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            retrieval_count: 3,
            similarity_threshold: 0.5,
            max_conversation_history: 5,
            generation_timeout_secs: 15,
            cache_capacity: 50,
            small_talk_max_words: 3,
            small_talk_max_score: 0.35,
            assistant_name: "NextStep".to_string(),
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationMetadata {
    pub chunk_index: u32,
    pub document_type: DocumentType,
}

/// A chunk the answer was grounded on, as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub document: String,
    pub chunk: String,
    pub score: f32,
    pub metadata: CitationMetadata,
}

impl From<&RetrievedResult> for SourceCitation {
    #[inline]
    fn from(result: &RetrievedResult) -> Self {
        let mut chunk: String = result.text.chars().take(CITATION_PREVIEW_CHARS).collect();
        if result.text.chars().count() > CITATION_PREVIEW_CHARS {
            chunk.push_str("...");
        }
        Self {
            document: result.metadata.source.clone(),
            chunk,
            score: (result.score * 100.0).round() / 100.0,
            metadata: CitationMetadata {
                chunk_index: result.metadata.chunk_index,
                document_type: result.metadata.document_type,
            },
        }
    }
}

/// Which terminal branch produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Generated,
    Cached,
    SmallTalk,
    InsufficientKnowledge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub response: String,
    pub sources: Vec<SourceCitation>,
    pub outcome: AnswerOutcome,
    /// Absent for cached answers
    pub strategy: Option<StrategyKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub generation_calls: u64,
    pub cache_hits: u64,
    pub cache_size: usize,
    /// Share of answers served from the cache, in `[0, 1]`
    pub cache_hit_rate: f64,
}

/// Answers questions from the document store.
pub struct RetrievalOrchestrator {
    retriever: Arc<dyn DocumentRetriever>,
    generator: Arc<dyn TextGenerator>,
    feedback: Option<Arc<dyn FeedbackSource>>,
    feedback_policy: FeedbackConfig,
    cache: Arc<ResponseCache>,
    config: RetrievalConfig,
    generation_calls: AtomicU64,
    cache_hits: AtomicU64,
}

impl RetrievalOrchestrator {
    #[inline]
    pub fn new(
        retriever: Arc<dyn DocumentRetriever>,
        generator: Arc<dyn TextGenerator>,
        config: RetrievalConfig,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache_capacity));
        Self {
            retriever,
            generator,
            feedback: None,
            feedback_policy: FeedbackConfig::default(),
            cache,
            config,
            generation_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn with_feedback(mut self, source: Arc<dyn FeedbackSource>, policy: FeedbackConfig) -> Self {
        self.feedback = Some(source);
        self.feedback_policy = policy;
        self
    }

    /// Share an existing cache, e.g. between orchestrators serving one process
    #[inline]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    #[inline]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    #[inline]
    pub async fn store_stats(&self) -> Result<StoreStats> {
        self.retriever.stats().await
    }

    #[inline]
    pub fn usage(&self) -> UsageStats {
        let generation_calls = self.generation_calls.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let served = generation_calls + cache_hits;
        UsageStats {
            generation_calls,
            cache_hits,
            cache_size: self.cache.len(),
            cache_hit_rate: if served == 0 {
                0.0
            } else {
                cache_hits as f64 / served as f64
            },
        }
    }

    /// Run the full pipeline for one question.
    #[inline]
    pub async fn answer(&self, query: &str, history: &[ConversationTurn]) -> Result<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::Validation(
                "Query must be a non-empty string".to_string(),
            ));
        }

        let cacheable = history.is_empty();
        if cacheable {
            if let Some(hit) = self.cache.get(query) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for query: {}", query);
                return Ok(RagAnswer {
                    response: hit.response,
                    sources: hit.sources,
                    outcome: AnswerOutcome::Cached,
                    strategy: None,
                });
            }
        }

        let strategy = strategy::select_strategy(
            self.feedback.as_deref(),
            &self.feedback_policy,
            query,
            self.config.retrieval_count,
        )
        .await;
        info!(
            "Retrieving {} documents (strategy: {})",
            strategy.document_count, strategy.kind
        );

        let documents = self.retrieve(&strategy.query, strategy.document_count).await?;
        let best_score = documents
            .iter()
            .map(|document| document.score)
            .fold(None, |best: Option<f32>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            });

        let relevant: Vec<RetrievedResult> = documents
            .into_iter()
            .filter(|document| document.score >= self.config.similarity_threshold)
            .collect();

        if relevant.is_empty() {
            return self.answer_without_context(query, best_score, strategy.kind).await;
        }

        let history = truncate_history(history, self.config.max_conversation_history);
        let prompt = prompt::build_prompt(&self.config.assistant_name, &relevant, history, query);
        let response = self.generate(&prompt).await?;
        let sources: Vec<SourceCitation> = relevant.iter().map(SourceCitation::from).collect();

        if cacheable {
            self.cache.insert(
                query,
                CachedAnswer {
                    response: response.clone(),
                    sources: sources.clone(),
                },
            );
        }

        Ok(RagAnswer {
            response,
            sources,
            outcome: AnswerOutcome::Generated,
            strategy: Some(strategy.kind),
        })
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedResult>> {
        let documents = self
            .retriever
            .similarity_search(query, top_k)
            .await
            .map_err(|e| match e {
                RagError::Validation(_) | RagError::RetrievalFailed(_) => e,
                other => RagError::RetrievalFailed(other.to_string()),
            })?;

        if documents.windows(2).any(|pair| pair[0].score < pair[1].score) {
            warn!("Retrieved documents are not ranked by descending similarity");
        }
        Ok(documents)
    }

    async fn answer_without_context(
        &self,
        query: &str,
        best_score: Option<f32>,
        strategy: StrategyKind,
    ) -> Result<RagAnswer> {
        let short = query.split_whitespace().count() <= self.config.small_talk_max_words;
        let low_relevance = best_score.unwrap_or(0.0) < self.config.small_talk_max_score;

        if short && low_relevance {
            debug!("Treating query as small talk: {}", query);
            let prompt = prompt::small_talk_prompt(&self.config.assistant_name, query);
            let response = self.generate(&prompt).await?;
            return Ok(RagAnswer {
                response,
                sources: Vec::new(),
                outcome: AnswerOutcome::SmallTalk,
                strategy: Some(strategy),
            });
        }

        Ok(RagAnswer {
            response: INSUFFICIENT_KNOWLEDGE_MESSAGE.to_string(),
            sources: Vec::new(),
            outcome: AnswerOutcome::InsufficientKnowledge,
            strategy: Some(strategy),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let call = self.generation_calls.fetch_add(1, Ordering::Relaxed) + 1;
        let deadline = self.config.generation_timeout();

        let response = generate_with_deadline(self.generator.as_ref(), prompt, deadline)
            .await
            .map_err(|e| match e {
                RagError::GenerationTimeout(_) | RagError::GenerationFailed(_) => e,
                other => RagError::GenerationFailed(other.to_string()),
            })?;

        debug!("Generation call #{} completed", call);
        Ok(response)
    }
}

/// The most recent `max_turns` turns
#[inline]
pub fn truncate_history(history: &[ConversationTurn], max_turns: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(max_turns);
    history.get(start..).unwrap_or(history)
}
