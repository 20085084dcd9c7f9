//! Vectorize command implementation

use crate::config::Config;
use crate::crawl::Crawler;
use crate::embed::{EmbedOptions, EmbeddingProvider};
use crate::error::Result;
use crate::ingest::{vectorize, VectorStoreResult, VectorizeRequest};
use crate::store::{StoreOptions, VectorIndex};
use tracing::info;

/// Crawl, chunk, embed and store a site
pub async fn cmd_vectorize(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    request: VectorizeRequest,
) -> Result<VectorStoreResult> {
    request.validate()?;
    info!(
        "Vectorizing {} into {}/{}",
        request.crawl.url, request.index_name, request.namespace
    );

    let crawler = Crawler::new(config.crawl.clone())?;
    let embed_options = EmbedOptions {
        batch_size: config.embedding.batch_size,
        batch_delay_ms: config.embedding.batch_delay_ms,
        metadata_content_limit: config.index.metadata_content_limit,
    };
    let store_options = StoreOptions {
        batch_size: config.embedding.batch_size,
        batch_delay_ms: config.embedding.batch_delay_ms,
    };

    vectorize(
        &crawler,
        embedder,
        index,
        &request,
        &embed_options,
        &store_options,
    )
    .await
}

/// Print a vectorize result to the console
pub fn print_vectorize_result(result: &VectorStoreResult) {
    println!("\n✓ Vectorization complete");
    println!("  Index: {}", result.index_name);
    println!("  Namespace: {}", result.namespace);
    println!("  Pages crawled: {}", result.crawl_summary.total_pages);
    println!("  Chunks created: {}", result.total_chunks);
    println!("  Tokens embedded: {}", result.total_tokens);
    println!("  Vectors stored: {}", result.vectors_stored);
    println!(
        "  Embedding: {} ({} dimensions)",
        result.embedding_model, result.embedding_dimension
    );
    println!("  Duration: {}ms", result.duration_ms);

    if !result.crawl_summary.errors.is_empty() {
        println!(
            "\n  {} pages failed during the crawl:",
            result.crawl_summary.errors.len()
        );
        for error in &result.crawl_summary.errors {
            println!("    {}: {}", error.url, error.error);
        }
    }
}
