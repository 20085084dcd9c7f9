//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the query, search and stats operations over stdio so editor
//! agents can use the index as a tool.

mod server;
mod tools;
mod types;

pub use server::McpServer;
pub use types::{McpError, McpRequest, McpResponse};
