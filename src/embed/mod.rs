//! Embedding generation
//!
//! `EmbeddingProvider` abstracts the external embedding API so tests can
//! substitute fakes. `embed_chunks` turns text chunks into vector records
//! in fixed-size batches: one provider call per batch, vectors paired with
//! chunks by position, fail-fast on any provider error.

mod http_backend;

pub use http_backend::*;

use crate::chunk::TextChunk;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum length of a vector record id accepted by the index provider
pub const MAX_ID_LENGTH: usize = 512;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input in order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Configured output dimension
    fn dimension(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;
}

/// A vector ready for the index
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Stable id derived from domain, path and chunk index
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// Batching options for the embedding pipeline
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    /// Character budget for chunk content stored in record metadata
    pub metadata_content_limit: usize,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 200,
            metadata_content_limit: 2000,
        }
    }
}

/// Embed chunks into vector records. A provider error for any batch aborts
/// the whole operation; no partial record set is returned.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &[TextChunk],
    options: &EmbedOptions,
) -> Result<Vec<VectorRecord>> {
    let batch_size = options.batch_size.max(1);
    let mut records = Vec::with_capacity(chunks.len());

    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        if batch_index > 0 && options.batch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.batch_delay_ms)).await;
        }

        debug!(
            "Embedding batch {} ({} chunks)",
            batch_index + 1,
            batch.len()
        );
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = provider.embed(texts).await?;

        if vectors.len() != batch.len() {
            return Err(Error::Upstream(format!(
                "Embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }

        for (chunk, values) in batch.iter().zip(vectors) {
            let id = derive_record_id(chunk);
            if id.is_empty() || id.len() > MAX_ID_LENGTH {
                warn!(
                    "Skipping chunk {} of {}: derived id is empty or exceeds {} characters",
                    chunk.metadata.chunk_index, chunk.metadata.url, MAX_ID_LENGTH
                );
                continue;
            }
            if values.len() != provider.dimension() {
                // Kept anyway: a consistent mismatch surfaces at the index,
                // silent truncation would not.
                warn!(
                    "Vector for {} has dimension {}, expected {}",
                    id,
                    values.len(),
                    provider.dimension()
                );
            }

            let metadata = record_metadata(chunk, options.metadata_content_limit);
            records.push(VectorRecord {
                id,
                values,
                metadata,
            });
        }
    }

    Ok(records)
}

/// Derive a stable, sanitized record id from the chunk's source location
/// plus a short content-independent disambiguator.
pub fn derive_record_id(chunk: &TextChunk) -> String {
    let path = Url::parse(&chunk.metadata.url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    let seed = format!("{}#{}", chunk.metadata.url, chunk.metadata.chunk_index);
    let digest = blake3::hash(seed.as_bytes()).to_hex();
    let suffix = &digest.as_str()[..8];

    let raw = format!(
        "{}{}-{}-{}",
        chunk.metadata.domain, path, chunk.metadata.chunk_index, suffix
    );
    sanitize_id(&raw)
}

/// Restrict ids to `[A-Za-z0-9._-]`, collapsing runs of other characters
fn sanitize_id(raw: &str) -> String {
    let mut id = String::with_capacity(raw.len());
    let mut last_was_dash = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            id.push(c);
            last_was_dash = c == '-';
        } else if !last_was_dash {
            id.push('-');
            last_was_dash = true;
        }
    }
    id.trim_matches('-').to_string()
}

fn record_metadata(chunk: &TextChunk, content_limit: usize) -> Map<String, Value> {
    let mut metadata = serde_json::to_value(&chunk.metadata)
        .ok()
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    metadata.insert(
        "content".to_string(),
        json!(truncate_chars(&chunk.content, content_limit)),
    );
    metadata
}

/// Truncate to at most `limit` characters on a char boundary
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fake provider recording call sizes; optionally fails on the nth call
    /// or emits vectors of a different length than it advertises
    pub struct FakeEmbedder {
        pub dimension: usize,
        pub calls: Mutex<Vec<usize>>,
        pub fail_on_call: Option<usize>,
        pub emit_dimension: Option<usize>,
        counter: AtomicUsize,
    }

    impl FakeEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
                emit_dimension: None,
                counter: AtomicUsize::new(0),
            }
        }

        pub fn failing_on(dimension: usize, call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::new(dimension)
            }
        }

        pub fn mismatched(dimension: usize, emit: usize) -> Self {
            Self {
                emit_dimension: Some(emit),
                ..Self::new(dimension)
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            let call = self.counter.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(texts.len());
            if self.fail_on_call == Some(call) {
                return Err(Error::Upstream("embedding provider unavailable".into()));
            }
            let emit = self.emit_dimension.unwrap_or(self.dimension);
            Ok(texts.iter().map(|_| vec![0.1; emit]).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "fake-embedding-model"
        }
    }

    pub fn make_chunk(index: usize, total: usize) -> TextChunk {
        TextChunk {
            content: format!("chunk content number {}", index),
            metadata: ChunkMetadata {
                url: "https://example.com/docs/guide".to_string(),
                title: "Guide".to_string(),
                chunk_index: index,
                total_chunks: total,
                word_count: 4,
                section: Some("Guide".to_string()),
                domain: "example.com".to_string(),
                depth: 1,
                crawled_at: Utc::now(),
                description: None,
                author: None,
                language: None,
                canonical_url: None,
            },
        }
    }

    fn fast_options() -> EmbedOptions {
        EmbedOptions {
            batch_delay_ms: 0,
            ..EmbedOptions::default()
        }
    }

    // Scenario: 150 chunks with batch size 100 make exactly two provider
    // calls of 100 and 50 items.
    #[tokio::test]
    async fn test_batching_sizes() {
        let chunks: Vec<TextChunk> = (0..150).map(|i| make_chunk(i, 150)).collect();
        let provider = FakeEmbedder::new(8);

        let records = embed_chunks(&provider, &chunks, &fast_options())
            .await
            .unwrap();

        assert_eq!(records.len(), 150);
        assert_eq!(*provider.calls.lock().unwrap(), vec![100, 50]);
    }

    #[tokio::test]
    async fn test_second_batch_failure_aborts() {
        let chunks: Vec<TextChunk> = (0..150).map(|i| make_chunk(i, 150)).collect();
        let provider = FakeEmbedder::failing_on(8, 1);

        let err = embed_chunks(&provider, &chunks, &fast_options())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(*provider.calls.lock().unwrap(), vec![100, 50]);
    }

    // A mismatched vector length is logged but the record is kept; the
    // index is the place that rejects it.
    #[tokio::test]
    async fn test_dimension_mismatch_keeps_record() {
        let chunks = vec![make_chunk(0, 1)];
        let provider = FakeEmbedder::mismatched(8, 3);

        let records = embed_chunks(&provider, &chunks, &fast_options())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].values.len(), 3);
    }

    #[tokio::test]
    async fn test_ids_unique_and_bounded() {
        let chunks: Vec<TextChunk> = (0..50).map(|i| make_chunk(i, 50)).collect();
        let provider = FakeEmbedder::new(8);

        let records = embed_chunks(&provider, &chunks, &fast_options())
            .await
            .unwrap();

        let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert!(records.iter().all(|r| r.id.len() <= MAX_ID_LENGTH));
        assert!(records
            .iter()
            .all(|r| r.id.chars().all(|c| c.is_ascii_alphanumeric()
                || c == '.'
                || c == '_'
                || c == '-')));
    }

    #[tokio::test]
    async fn test_metadata_content_truncated() {
        let mut chunk = make_chunk(0, 1);
        chunk.content = "x".repeat(5000);
        let provider = FakeEmbedder::new(8);

        let options = EmbedOptions {
            metadata_content_limit: 100,
            batch_delay_ms: 0,
            ..EmbedOptions::default()
        };
        let records = embed_chunks(&provider, &[chunk], &options).await.unwrap();

        let content = records[0].metadata.get("content").unwrap().as_str().unwrap();
        assert_eq!(content.chars().count(), 100);
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("example.com/docs/a b-0-ff"), "example.com-docs-a-b-0-ff");
        assert_eq!(sanitize_id("---x---"), "x");
    }

    #[test]
    fn test_derive_record_id_stable() {
        let chunk = make_chunk(3, 10);
        assert_eq!(derive_record_id(&chunk), derive_record_id(&chunk));
        let other = make_chunk(4, 10);
        assert_ne!(derive_record_id(&chunk), derive_record_id(&other));
    }
}
