//! MCP Error Handling
//!
//! Protocol-level failures and their JSON-RPC error codes. Failures inside a
//! tool are not protocol errors; they come back as `isError` tool results.

use thiserror::Error;

use crate::RagError;
use crate::mcp::protocol::{JsonRpcError, error_codes, mcp_error_codes};

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unsupported protocol version: {version}. Supported: {}", supported.join(", "))]
    UnsupportedProtocolVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid parameters for tool '{tool}': {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Server not initialized. Send initialize request first.")]
    ServerNotInitialized,

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl McpError {
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            Self::UnsupportedProtocolVersion { .. } => mcp_error_codes::INVALID_PROTOCOL_VERSION,
            Self::ToolNotFound { .. } => mcp_error_codes::TOOL_NOT_FOUND,
            Self::InvalidToolParameters { .. } | Self::InvalidParameters { .. } => {
                error_codes::INVALID_PARAMS
            }
            Self::ServerNotInitialized | Self::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            Self::InternalError { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        JsonRpcError::new(self.code(), self.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidParameters {
            message: error.to_string(),
        }
    }
}

impl From<McpError> for RagError {
    #[inline]
    fn from(error: McpError) -> Self {
        Self::Mcp(error.to_string())
    }
}
