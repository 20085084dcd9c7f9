//! MCP tool definitions and handlers

use super::types::ToolResult;
use crate::commands::{cmd_query, cmd_search, cmd_stats};
use crate::complete::CompletionProvider;
use crate::config::Config;
use crate::embed::EmbeddingProvider;
use crate::error::Error;
use crate::rag::MAX_TOP_K;
use crate::store::QdrantIndex;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Tool definition for MCP
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "rag_query".to_string(),
            description: "Answer a question from the indexed documentation using retrieval-augmented generation. Returns a cited answer with its sources.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language question to answer"
                    },
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to query (default: configured namespace)"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of chunks to retrieve (default: 5, max: 20)",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "rag_search".to_string(),
            description: "Search the documentation index for relevant chunks without synthesizing an answer. Returns the raw matching passages.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query - natural language question or keywords"
                    },
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to search (default: configured namespace)"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Maximum number of results to return (default: 5, max: 20)",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "rag_stats".to_string(),
            description: "Get statistics about the vector index and the configured namespace.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to report on (default: configured namespace)"
                    }
                }
            }),
        },
    ]
}

/// Handle a tool call
pub async fn handle_tool_call(
    name: &str,
    arguments: &HashMap<String, Value>,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &QdrantIndex,
    completer: &dyn CompletionProvider,
) -> ToolResult {
    match name {
        "rag_query" => handle_query(arguments, config, embedder, index, completer).await,
        "rag_search" => handle_search(arguments, config, embedder, index).await,
        "rag_stats" => handle_stats(arguments, config, index).await,
        _ => ToolResult::error(format!("Unknown tool: {}", name)),
    }
}

fn arg_namespace<'a>(arguments: &'a HashMap<String, Value>, config: &'a Config) -> &'a str {
    arguments
        .get("namespace")
        .and_then(|v| v.as_str())
        .unwrap_or(&config.index.namespace)
}

fn arg_top_k(arguments: &HashMap<String, Value>) -> usize {
    arguments
        .get("top_k")
        .and_then(|v| v.as_u64())
        .map(|v| (v as usize).min(MAX_TOP_K))
        .unwrap_or(5)
}

/// Handle rag_query tool
async fn handle_query(
    arguments: &HashMap<String, Value>,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &QdrantIndex,
    completer: &dyn CompletionProvider,
) -> ToolResult {
    let query = match arguments.get("query").and_then(|v| v.as_str()) {
        Some(q) => q,
        None => return ToolResult::error("Missing required parameter: query"),
    };
    let namespace = arg_namespace(arguments, config);
    let top_k = arg_top_k(arguments);

    match cmd_query(embedder, index, completer, query, namespace, top_k, None).await {
        Ok(result) => {
            let mut output = result.answer.clone();
            output.push_str(&format!("\n\n**Confidence:** {:.0}%\n", result.confidence));
            output.push_str("\n**Sources:**\n");
            for (i, source) in result.sources.iter().enumerate() {
                let title = source
                    .metadata
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled");
                let url = source
                    .metadata
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                output.push_str(&format!(
                    "{}. {} (score: {:.2}) {}\n",
                    i + 1,
                    title,
                    source.score,
                    url
                ));
            }
            ToolResult::text(output)
        }
        Err(Error::NotFound(message)) => ToolResult::text(message),
        Err(e) => ToolResult::error(format!("Query failed: {}", e)),
    }
}

/// Handle rag_search tool
async fn handle_search(
    arguments: &HashMap<String, Value>,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &QdrantIndex,
) -> ToolResult {
    let query = match arguments.get("query").and_then(|v| v.as_str()) {
        Some(q) => q,
        None => return ToolResult::error("Missing required parameter: query"),
    };
    let namespace = arg_namespace(arguments, config);
    let top_k = arg_top_k(arguments);

    match cmd_search(embedder, index, query, namespace, top_k, None).await {
        Ok(response) => {
            if response.matches.is_empty() {
                return ToolResult::text("No results found matching your query.");
            }

            let mut output = format!("Found {} results:\n\n", response.total_matches);
            for (i, m) in response.matches.iter().enumerate() {
                let title = m
                    .metadata
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled");
                let url = m.metadata.get("url").and_then(|v| v.as_str()).unwrap_or("");
                output.push_str(&format!("## Result {} (score: {:.2})\n", i + 1, m.score));
                output.push_str(&format!("**Title:** {}\n", title));
                output.push_str(&format!("**URL:** {}\n", url));
                if let Some(content) = m.metadata.get("content").and_then(|v| v.as_str()) {
                    output.push_str("\n```\n");
                    output.push_str(content);
                    output.push_str("\n```\n\n");
                } else {
                    output.push('\n');
                }
            }
            ToolResult::text(output)
        }
        Err(e) => ToolResult::error(format!("Search failed: {}", e)),
    }
}

/// Handle rag_stats tool
async fn handle_stats(
    arguments: &HashMap<String, Value>,
    config: &Config,
    index: &QdrantIndex,
) -> ToolResult {
    let namespace = arg_namespace(arguments, config);

    match cmd_stats(config, index, namespace).await {
        Ok(report) => {
            if !report.stats.exists {
                return ToolResult::text(format!(
                    "Index '{}' does not exist yet. Vectorize a site first.",
                    report.index_name
                ));
            }
            ToolResult::text(format!(
                "Index Status:\n\n\
                 - Index: {}\n\
                 - Dimension: {}\n\
                 - Total vectors: {}\n\
                 - Fullness: {:.1}%\n\
                 - Namespace '{}': {} vectors",
                report.index_name,
                report.stats.dimension,
                report.stats.vector_count,
                report.stats.fullness * 100.0,
                report.namespace,
                report.namespace_vectors
            ))
        }
        Err(e) => ToolResult::error(format!("Failed to get stats: {}", e)),
    }
}
