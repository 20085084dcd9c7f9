//! Ingestion pipeline: crawl -> chunk -> embed -> store
//!
//! Stages run sequentially; a crawl with partial page failures still feeds
//! the rest of the pipeline, while an embedding or storage failure aborts
//! the whole operation.

use crate::chunk::chunk_pages;
use crate::crawl::{CrawlRequest, CrawlSummary, Crawler};
use crate::embed::{embed_chunks, EmbedOptions, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::store::{store_records, StoreOptions, VectorIndex};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Parameters for a full ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizeRequest {
    #[serde(flatten)]
    pub crawl: CrawlRequest,
    pub index_name: String,
    pub namespace: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl VectorizeRequest {
    pub fn validate(&self) -> Result<()> {
        self.crawl.validate()?;
        if self.index_name.trim().is_empty() {
            return Err(Error::Validation("indexName must not be empty".to_string()));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::Validation("namespace must not be empty".to_string()));
        }
        if !(100..=8000).contains(&self.chunk_size) {
            return Err(Error::Validation(
                "chunkSize must be between 100 and 8000".to_string(),
            ));
        }
        if self.chunk_overlap > 500 {
            return Err(Error::Validation(
                "chunkOverlap must be between 0 and 500".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Validation(
                "chunkOverlap must be smaller than chunkSize".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct VectorStoreResult {
    pub index_name: String,
    pub namespace: String,
    pub vectors_stored: usize,
    pub total_chunks: usize,
    /// Whitespace tokens across all chunks, counting overlap regions once
    /// per chunk they appear in
    pub total_tokens: usize,
    pub crawl_summary: CrawlSummary,
    pub duration_ms: u64,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

/// Run the full pipeline for one request
pub async fn vectorize(
    crawler: &Crawler,
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    request: &VectorizeRequest,
    embed_options: &EmbedOptions,
    store_options: &StoreOptions,
) -> Result<VectorStoreResult> {
    let started = Instant::now();

    let crawl_result = crawler.crawl(&request.crawl).await?;
    info!(
        "Crawl finished: {} pages, {} errors",
        crawl_result.summary.total_pages,
        crawl_result.summary.errors.len()
    );

    let chunks = chunk_pages(&crawl_result.pages, request.chunk_size, request.chunk_overlap);
    let total_chunks = chunks.len();
    let total_tokens: usize = chunks.iter().map(|c| c.metadata.word_count).sum();
    info!("Chunked {} pages into {} chunks", crawl_result.pages.len(), total_chunks);

    let records = embed_chunks(embedder, &chunks, embed_options).await?;
    let vectors_stored = store_records(index, records, &request.namespace, store_options).await?;
    info!(
        "Stored {} vectors in namespace {}",
        vectors_stored, request.namespace
    );

    Ok(VectorStoreResult {
        index_name: request.index_name.clone(),
        namespace: request.namespace.clone(),
        vectors_stored,
        total_chunks,
        total_tokens,
        crawl_summary: crawl_result.summary,
        duration_ms: started.elapsed().as_millis() as u64,
        embedding_model: embedder.model_name().to_string(),
        embedding_dimension: embedder.dimension(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;
    use crate::embed::tests::FakeEmbedder;
    use crate::store::tests::FakeIndex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_request(url: String) -> VectorizeRequest {
        VectorizeRequest {
            crawl: CrawlRequest {
                delay_ms: 0,
                max_depth: 1,
                max_pages: 10,
                ..CrawlRequest::new(url)
            },
            index_name: "docrag".to_string(),
            namespace: "docs".to_string(),
            chunk_size: 100,
            chunk_overlap: 20,
        }
    }

    fn fast_embed_options() -> EmbedOptions {
        EmbedOptions {
            batch_delay_ms: 0,
            ..EmbedOptions::default()
        }
    }

    fn fast_store_options() -> StoreOptions {
        StoreOptions {
            batch_delay_ms: 0,
            ..StoreOptions::default()
        }
    }

    #[test]
    fn test_validation_names_fields() {
        let mut request = test_request("https://example.com".to_string());
        request.crawl.delay_ms = 1000;
        assert!(request.validate().is_ok());

        request.chunk_size = 50;
        assert!(request
            .validate()
            .unwrap_err()
            .to_string()
            .contains("chunkSize"));

        request.chunk_size = 300;
        request.chunk_overlap = 400;
        assert!(request
            .validate()
            .unwrap_err()
            .to_string()
            .contains("chunkOverlap"));

        request.chunk_overlap = 20;
        request.namespace = String::new();
        assert!(request
            .validate()
            .unwrap_err()
            .to_string()
            .contains("namespace"));
    }

    #[tokio::test]
    async fn test_vectorize_end_to_end() {
        let server = MockServer::start().await;
        let words: String = (0..250).map(|i| format!("word{} ", i)).collect();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!(
                    "<html><head><title>Doc</title></head><body><main><h1>Doc</h1><p>{}</p></main></body></html>",
                    words
                )
                .into_bytes(),
                "text/html",
            ))
            .mount(&server)
            .await;

        let crawler = Crawler::new(CrawlConfig {
            timeout_secs: 5,
            ..CrawlConfig::default()
        })
        .unwrap();
        let embedder = FakeEmbedder::new(8);
        let index = FakeIndex::new();

        let request = test_request(format!("{}/", server.uri()));
        let result = vectorize(
            &crawler,
            &embedder,
            &index,
            &request,
            &fast_embed_options(),
            &fast_store_options(),
        )
        .await
        .unwrap();

        assert_eq!(result.namespace, "docs");
        assert_eq!(result.crawl_summary.total_pages, 1);
        // ~252 tokens in windows of 100 with a 20-token overlap
        assert!(result.total_chunks >= 3);
        assert!(result.total_tokens >= 250);
        assert_eq!(result.vectors_stored, result.total_chunks);
        assert_eq!(index.stored_count(), result.total_chunks);
        assert_eq!(result.embedding_model, "fake-embedding-model");
        assert_eq!(result.embedding_dimension, 8);

        let stored = index.stored.lock().unwrap();
        assert!(stored.iter().all(|(ns, _)| ns == "docs"));
    }

    #[tokio::test]
    async fn test_vectorize_aborts_on_embedding_failure() {
        let server = MockServer::start().await;
        let words: String = (0..25_000).map(|i| format!("word{} ", i)).collect();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!("<html><body><main><p>{}</p></main></body></html>", words).into_bytes(),
                "text/html",
            ))
            .mount(&server)
            .await;

        let crawler = Crawler::new(CrawlConfig {
            timeout_secs: 5,
            ..CrawlConfig::default()
        })
        .unwrap();
        // >100 chunks, so the pipeline needs two embedding calls
        let embedder = FakeEmbedder::failing_on(8, 1);
        let index = FakeIndex::new();

        let request = test_request(format!("{}/", server.uri()));
        let err = vectorize(
            &crawler,
            &embedder,
            &index,
            &request,
            &fast_embed_options(),
            &fast_store_options(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(index.stored_count(), 0);
    }
}
