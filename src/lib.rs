//! docrag - crawl documentation sites into a vector index and query them
//!
//! This crate provides:
//! - A polite breadth-first crawler with content extraction for HTML docs
//! - Token-window chunking, embedding and storage in Qdrant namespaces
//! - Retrieval-augmented question answering over the indexed content
//! - An MCP server over stdio so editor agents can use the index as a tool

pub mod chunk;
pub mod commands;
pub mod complete;
pub mod config;
pub mod crawl;
pub mod embed;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod mcp;
pub mod rag;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
