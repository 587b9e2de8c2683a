//! MCP (Model Context Protocol) Server Implementation
//!
//! A stdio JSON-RPC 2.0 server exposing the assistant as tools.


pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;

pub use errors::McpError;
pub use server::{ConnectionState, McpServer, ToolHandler};
pub use tools::register_default_tools;
