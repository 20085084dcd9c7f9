//! Search command implementation

use crate::embed::EmbeddingProvider;
use crate::error::Result;
use crate::rag::{search, SearchResponse};
use crate::store::VectorIndex;
use serde_json::{Map, Value};
use tracing::info;

/// Raw similarity search without answer synthesis
pub async fn cmd_search(
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    query: &str,
    namespace: &str,
    top_k: usize,
    filter: Option<Map<String, Value>>,
) -> Result<SearchResponse> {
    info!("Searching namespace {}", namespace);
    search(embedder, index, query, namespace, top_k, filter).await
}

/// Print search matches to the console
pub fn print_search_results(response: &SearchResponse, query: &str) {
    println!("\n🔍 Query: {}\n", query);
    println!(
        "Found {} matches ({}ms):\n",
        response.total_matches, response.duration_ms
    );

    for (i, m) in response.matches.iter().enumerate() {
        let title = m
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled");
        let url = m.metadata.get("url").and_then(|v| v.as_str()).unwrap_or("");
        println!("{}. [score: {:.3}] {}", i + 1, m.score, title);
        if !url.is_empty() {
            println!("   {}", url);
        }

        if let Some(content) = m.metadata.get("content").and_then(|v| v.as_str()) {
            let content = content.trim();
            let preview: String = content.chars().take(200).collect();
            if preview.len() < content.len() {
                println!("   {}...\n", preview.replace('\n', " "));
            } else {
                println!("   {}\n", preview.replace('\n', " "));
            }
        } else {
            println!();
        }
    }
}
