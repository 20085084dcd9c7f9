//! Default values for configuration

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default collection name backing the vector index
pub fn default_index_name() -> String {
    "docrag".to_string()
}

/// Default namespace for crawl/query operations
pub fn default_namespace() -> String {
    "default".to_string()
}

/// Default embeddings endpoint (OpenAI-compatible)
pub fn default_embedding_url() -> String {
    std::env::var("DOCRAG_EMBEDDING_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension (text-embedding-3-small)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding and upsert requests
pub fn default_batch_size() -> usize {
    100
}

/// Default delay between provider batches in milliseconds
pub fn default_batch_delay_ms() -> u64 {
    200
}

/// Default character budget for chunk content stored in the index payload
pub fn default_metadata_content_limit() -> usize {
    2000
}

/// Default completions endpoint (OpenAI-compatible)
pub fn default_completion_url() -> String {
    std::env::var("DOCRAG_COMPLETION_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

/// Default completion model
pub fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default completion temperature
pub fn default_completion_temperature() -> f32 {
    0.2
}

/// Default completion token budget
pub fn default_completion_max_tokens() -> usize {
    1024
}

/// Default maximum crawl depth
pub fn default_crawl_max_depth() -> u32 {
    2
}

/// Default maximum pages per crawl
pub fn default_crawl_max_pages() -> u32 {
    50
}

/// Default inter-request delay in milliseconds
pub fn default_crawl_delay_ms() -> u64 {
    1000
}

/// Default concurrent fetches per batch
pub fn default_crawl_max_concurrent() -> usize {
    5
}

/// Default request timeout in seconds
pub fn default_crawl_timeout_secs() -> u64 {
    30
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!("docrag/{} (Documentation Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default chunk size in whitespace tokens
pub fn default_chunk_size() -> usize {
    1000
}

/// Default chunk overlap in whitespace tokens
pub fn default_chunk_overlap() -> usize {
    200
}
