//! Token-window chunking
//!
//! Pages are split into overlapping windows of whitespace tokens. Chunking
//! is deterministic and pure per page; a page whose metadata cannot be
//! derived (malformed URL) is logged and skipped without aborting the batch.

use crate::extract::Page;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// A bounded, overlapping span of a page's text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub word_count: usize,
    /// Approximate section label: the page's first heading for every chunk
    /// of that page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub domain: String,
    pub depth: u32,
    pub crawled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
}

/// Chunk a batch of pages. `chunk_overlap` must be smaller than
/// `chunk_size`; callers validate that at the boundary, this function
/// treats a violation as a programming error and clamps it.
pub fn chunk_pages(pages: &[Page], chunk_size: usize, chunk_overlap: usize) -> Vec<TextChunk> {
    let chunk_size = chunk_size.max(1);
    let chunk_overlap = chunk_overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    for page in pages {
        match chunk_page(page, chunk_size, chunk_overlap) {
            Ok(page_chunks) => chunks.extend(page_chunks),
            Err(e) => {
                warn!("Skipping chunks for {}: {}", page.url, e);
            }
        }
    }
    chunks
}

fn chunk_page(
    page: &Page,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<TextChunk>, url::ParseError> {
    let url = Url::parse(&page.url)?;
    let domain = url.host_str().unwrap_or_default().to_string();
    let section = page.metadata.headings.first().map(|h| h.text.clone());

    let text = format!("{} {}", page.title, page.content);
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let windows = token_windows(&tokens, chunk_size, chunk_overlap);
    let contents: Vec<String> = if windows.is_empty() {
        // Very short page: the whole text is one chunk
        vec![text.trim().to_string()]
    } else {
        windows.into_iter().map(|w| w.join(" ")).collect()
    };

    let total_chunks = contents.len();
    let chunks = contents
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| {
            let word_count = content.split_whitespace().count();
            TextChunk {
                content,
                metadata: ChunkMetadata {
                    url: page.url.clone(),
                    title: page.title.clone(),
                    chunk_index,
                    total_chunks,
                    word_count,
                    section: section.clone(),
                    domain: domain.clone(),
                    depth: page.depth,
                    crawled_at: page.crawled_at,
                    description: page.metadata.description.clone(),
                    author: page.metadata.author.clone(),
                    language: page.metadata.language.clone(),
                    canonical_url: page.metadata.canonical_url.clone(),
                },
            }
        })
        .collect();

    Ok(chunks)
}

/// Cut windows of `chunk_size` tokens. Window `k` starts at
/// `k * chunk_size - overlap` (window 0 at zero), so the second window
/// re-reads the tail of the first and later windows tile contiguously.
/// Returns no windows when the token stream is empty.
fn token_windows<'a>(
    tokens: &'a [&'a str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<&'a [&'a str]> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(tokens.len());
        windows.push(&tokens[start..end]);
        if end == tokens.len() {
            break;
        }
        start = if start == 0 {
            chunk_size - overlap
        } else {
            start + chunk_size
        };
    }
    windows
}
