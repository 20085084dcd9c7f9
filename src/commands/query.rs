//! Query command implementation

use crate::complete::CompletionProvider;
use crate::embed::EmbeddingProvider;
use crate::error::Result;
use crate::rag::{answer, RagAnswer};
use crate::store::VectorIndex;
use serde_json::{Map, Value};
use tracing::info;

/// Answer a question with retrieval-augmented generation
pub async fn cmd_query(
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    completer: &dyn CompletionProvider,
    query: &str,
    namespace: &str,
    top_k: usize,
    filter: Option<Map<String, Value>>,
) -> Result<RagAnswer> {
    info!("Answering query against namespace {}", namespace);
    answer(embedder, index, completer, query, namespace, top_k, filter).await
}

/// Print an answer with its sources to the console
pub fn print_answer(result: &RagAnswer) {
    println!("\n{}\n", result.answer);
    println!(
        "Confidence: {:.0}%  (namespace: {}, {}ms)",
        result.confidence, result.namespace, result.duration_ms
    );

    println!("\nSources:");
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
        println!("  {}. [score: {:.3}] {} — {}", i + 1, source.score, title, url);
    }
}
