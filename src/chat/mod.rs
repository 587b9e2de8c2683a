// Chat surface: routes a message, answers it, records ratings and reports status


pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::sqlite::models::{FeedbackKind, NewFeedback};
use crate::feedback::FeedbackLoop;
use crate::rag::{ConversationTurn, RetrievalOrchestrator, SourceCitation, UsageStats};
use crate::router::{Handler, QueryRouter, RouteDecision};
use crate::{RagError, Result};

use handlers::CannedReply;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    /// Accepted for compatibility; replies are always returned whole
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatRequest {
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_history: Vec::new(),
            stream: false,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    OffTopic,
    AuthRequired,
    UserData,
    ActionGuide,
    ActionMenu,
    Troubleshooting,
    Greeting,
    Acknowledgment,
    SmallTalk,
    Documentation,
    Error,
}

/// A suggested follow-up the client can render as a button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAction {
    pub label: String,
    pub action: String,
    pub target: String,
}

impl ChatAction {
    #[inline]
    pub fn navigate(label: &str, target: &str) -> Self {
        Self {
            label: label.to_string(),
            action: "navigate".to_string(),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<SourceCitation>,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ChatAction>,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds spent handling the request
    pub response_time: u64,
}

/// Application totals for one user, by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCounts {
    pub total: u64,
    pub pending: u64,
    pub interviewing: u64,
    pub offered: u64,
    pub rejected: u64,
}

/// The job board's application store, read by the user-status handler.
#[async_trait]
pub trait ApplicationsLookup: Send + Sync {
    async fn application_counts(&self, user_id: &str) -> Result<ApplicationCounts>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub message_id: String,
    pub feedback: String,
    pub query: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAck {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Ready,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreStatus {
    pub document_count: usize,
    pub collection_name: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagServiceStatus {
    pub similarity_threshold: f32,
    pub max_conversation_history: usize,
    pub retrieval_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<VectorStoreStatus>,
    pub rag_service: RagServiceStatus,
    pub usage: UsageStats,
}

pub struct ChatService {
    router: QueryRouter,
    rag: Arc<RetrievalOrchestrator>,
    feedback: Option<FeedbackLoop>,
    applications: Option<Arc<dyn ApplicationsLookup>>,
}

impl ChatService {
    #[inline]
    pub fn new(router: QueryRouter, rag: Arc<RetrievalOrchestrator>) -> Self {
        Self {
            router,
            rag,
            feedback: None,
            applications: None,
        }
    }

    #[inline]
    pub fn with_feedback(mut self, feedback: FeedbackLoop) -> Self {
        self.feedback = Some(feedback);
        self
    }

    #[inline]
    pub fn with_applications(mut self, applications: Arc<dyn ApplicationsLookup>) -> Self {
        self.applications = Some(applications);
        self
    }

    #[inline]
    pub fn orchestrator(&self) -> &RetrievalOrchestrator {
        &self.rag
    }

    /// Route and answer one chat message.
    #[inline]
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let started = Instant::now();
        let message = self.prepare_message(&request.message)?;
        if request
            .conversation_history
            .iter()
            .any(|turn| turn.content.trim().is_empty())
        {
            return Err(RagError::Validation(
                "Each conversation history item must have role and content".to_string(),
            ));
        }
        if request.stream {
            debug!("Streaming requested; replying with a complete response");
        }

        let mut response = match self.router.route(&message) {
            RouteDecision::OffTopic { category, .. } => ChatResponse {
                response: category.redirect_message().to_string(),
                sources: Vec::new(),
                response_type: ResponseType::OffTopic,
                category: Some(category.to_string()),
                data: None,
                actions: handlers::off_topic_actions(),
                timestamp: Utc::now(),
                response_time: 0,
            },
            RouteDecision::Intent(matched) => match matched.handler {
                Handler::SearchDocumentation => {
                    let answer = self
                        .rag
                        .answer(&message, &request.conversation_history)
                        .await?;
                    info!("Response generated with {} sources", answer.sources.len());
                    ChatResponse {
                        response: answer.response,
                        sources: answer.sources,
                        response_type: ResponseType::Documentation,
                        category: None,
                        data: None,
                        actions: Vec::new(),
                        timestamp: Utc::now(),
                        response_time: 0,
                    }
                }
                Handler::UserStatus => self.user_status(request.user_id.as_deref()).await,
                Handler::ExecuteAction => canned(handlers::action_guide(&message)),
                Handler::Troubleshoot => canned(handlers::troubleshooting(&message)),
                Handler::Greeting => canned(handlers::greeting()),
                Handler::Acknowledgment => canned(handlers::thanks()),
                Handler::SmallTalk => canned(handlers::small_talk(&message)),
            },
        };

        response.response_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(response)
    }

    fn prepare_message(&self, message: &str) -> Result<String> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(RagError::Validation(
                "Message is required and must be a non-empty string".to_string(),
            ));
        }

        let limit = self.router.config().max_message_length;
        if trimmed.chars().count() > limit {
            debug!("Truncating message to {} characters", limit);
            return Ok(trimmed.chars().take(limit).collect());
        }
        Ok(trimmed.to_string())
    }

    async fn user_status(&self, user_id: Option<&str>) -> ChatResponse {
        let user_id = user_id.map(str::trim).filter(|id| !id.is_empty());
        let (Some(lookup), Some(user_id)) = (&self.applications, user_id) else {
            return canned(handlers::sign_in_required());
        };

        match lookup.application_counts(user_id).await {
            Ok(counts) => {
                let mut response = canned(handlers::user_status(&counts));
                response.data = serde_json::to_value(counts).ok();
                response
            }
            Err(e) => {
                warn!("Failed to fetch application status: {}", e);
                canned(handlers::user_status_unavailable())
            }
        }
    }

    /// Persist a user's rating of an answer.
    #[inline]
    pub async fn submit_feedback(&self, submission: FeedbackSubmission) -> Result<FeedbackAck> {
        let kind: FeedbackKind = submission.feedback.trim().parse()?;
        let Some(feedback) = &self.feedback else {
            return Err(RagError::Config(
                "feedback store is not configured".to_string(),
            ));
        };

        feedback
            .record(NewFeedback {
                message_id: submission.message_id,
                query: submission.query,
                feedback: kind,
                comment: submission.comment,
                user_id: submission.user_id,
            })
            .await?;

        Ok(FeedbackAck {
            success: true,
            message: "Thank you for your feedback!".to_string(),
        })
    }

    /// Readiness of the vector store plus retrieval settings and usage counters
    #[inline]
    pub async fn status(&self) -> StatusReport {
        let config = self.rag.config();
        let rag_service = RagServiceStatus {
            similarity_threshold: config.similarity_threshold,
            max_conversation_history: config.max_conversation_history,
            retrieval_count: config.retrieval_count,
        };

        let (status, vector_store) = match self.rag.store_stats().await {
            Ok(stats) => (
                ServiceStatus::Ready,
                Some(VectorStoreStatus {
                    document_count: stats.count,
                    collection_name: stats.collection_name,
                    embedding_model: stats.embedding_model,
                    embedding_dimension: stats.embedding_dimension,
                }),
            ),
            Err(e) => {
                warn!("Vector store unavailable: {}", e);
                (ServiceStatus::Unavailable, None)
            }
        };

        StatusReport {
            status,
            vector_store,
            rag_service,
            usage: self.rag.usage(),
        }
    }
}

fn canned(reply: CannedReply) -> ChatResponse {
    ChatResponse {
        response: reply.response,
        sources: Vec::new(),
        response_type: reply.response_type,
        category: None,
        data: None,
        actions: reply.actions,
        timestamp: Utc::now(),
        response_time: 0,
    }
}
