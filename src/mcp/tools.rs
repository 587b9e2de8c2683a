//! MCP Tools Implementation
//!
//! The chat, feedback and status operations exposed as tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error};

use crate::chat::{ChatRequest, ChatService, FeedbackSubmission};
use crate::mcp::errors::McpError;
use crate::mcp::protocol::{CallToolParams, CallToolResult, Tool};
use crate::mcp::server::{McpServer, ToolHandler};

fn parse_arguments<T: DeserializeOwned>(params: &CallToolParams) -> Result<T, McpError> {
    serde_json::from_value(params.arguments_value()).map_err(|e| McpError::InvalidToolParameters {
        tool: params.name.clone(),
        message: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    CallToolResult::json(value).map_err(|e| McpError::InternalError {
        message: e.to_string(),
    })
}

/// Answers a chat message through the router and retrieval pipeline
pub struct ChatToolHandler {
    chat: Arc<ChatService>,
}

impl ChatToolHandler {
    #[inline]
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "chat".to_string(),
            description: Some(
                "Ask the help assistant a question; answers are grounded in the ingested documentation"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The user's message (truncated to 1000 characters)"
                    },
                    "conversationHistory": {
                        "type": "array",
                        "description": "Earlier turns, oldest first",
                        "items": {
                            "type": "object",
                            "properties": {
                                "role": { "type": "string", "enum": ["user", "assistant"] },
                                "content": { "type": "string" }
                            },
                            "required": ["role", "content"]
                        }
                    },
                    "stream": { "type": "boolean" },
                    "userId": {
                        "type": "string",
                        "description": "Optional: signed-in user, enables account-specific answers"
                    }
                },
                "required": ["message"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ChatToolHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult, McpError> {
        let request: ChatRequest = parse_arguments(&params)?;
        debug!("Chat tool called with {} history turns", request.conversation_history.len());

        match self.chat.handle(request).await {
            Ok(response) => encode(&response),
            Err(e) if e.is_client_error() => Err(McpError::InvalidToolParameters {
                tool: params.name,
                message: e.user_message(),
            }),
            Err(e) => {
                error!("Chat request failed: {}", e);
                Ok(CallToolResult::error(e.user_message()))
            }
        }
    }
}

/// Records a thumbs-up or thumbs-down on an earlier answer
pub struct SubmitFeedbackHandler {
    chat: Arc<ChatService>,
}

impl SubmitFeedbackHandler {
    #[inline]
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "submit_feedback".to_string(),
            description: Some("Rate an answer as helpful or unhelpful".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "messageId": { "type": "string" },
                    "feedback": { "type": "string", "enum": ["positive", "negative"] },
                    "query": {
                        "type": "string",
                        "description": "The question that produced the rated answer"
                    },
                    "comment": { "type": "string" },
                    "userId": { "type": "string" }
                },
                "required": ["messageId", "feedback", "query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SubmitFeedbackHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult, McpError> {
        let submission: FeedbackSubmission = parse_arguments(&params)?;

        match self.chat.submit_feedback(submission).await {
            Ok(ack) => encode(&ack),
            Err(e) if e.is_client_error() => Err(McpError::InvalidToolParameters {
                tool: params.name,
                message: e.user_message(),
            }),
            Err(e) => {
                error!("Failed to record feedback: {}", e);
                Ok(CallToolResult::error(e.user_message()))
            }
        }
    }
}

/// Reports vector store readiness, retrieval settings and usage counters
pub struct RagStatusHandler {
    chat: Arc<ChatService>,
}

impl RagStatusHandler {
    #[inline]
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "rag_status".to_string(),
            description: Some("Show knowledge base and assistant status".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for RagStatusHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> Result<CallToolResult, McpError> {
        encode(&self.chat.status().await)
    }
}

/// Register the chat, feedback and status tools on `server`
#[inline]
pub async fn register_default_tools(server: &McpServer, chat: &Arc<ChatService>) {
    server
        .register_tool(
            ChatToolHandler::tool_definition(),
            ChatToolHandler::new(Arc::clone(chat)),
        )
        .await;
    server
        .register_tool(
            SubmitFeedbackHandler::tool_definition(),
            SubmitFeedbackHandler::new(Arc::clone(chat)),
        )
        .await;
    server
        .register_tool(
            RagStatusHandler::tool_definition(),
            RagStatusHandler::new(Arc::clone(chat)),
        )
        .await;
}
