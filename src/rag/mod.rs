//! Retrieval and answer synthesis
//!
//! `search` embeds the query and runs one namespace-scoped nearest-neighbor
//! lookup. `answer` builds a cited context block from the usable matches,
//! scores confidence from their mean similarity, and asks the completion
//! provider to answer from that context alone.

use crate::complete::CompletionProvider;
use crate::embed::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::store::{RankedMatch, VectorIndex};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info};

/// Bounds on the number of retrieved matches
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 20;

const SYSTEM_PROMPT: &str = "You are a documentation assistant. Answer the \
user's question using only the supplied context. Cite the sources you use \
as (Source N). If the context does not contain the answer, say so instead \
of guessing.";

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub matches: Vec<RankedMatch>,
    pub total_matches: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RankedMatch>,
    /// Mean similarity of the sources actually used, scaled to [0, 100]
    pub confidence: f32,
    pub namespace: String,
    pub duration_ms: u64,
}

/// Embed the query and search the index. Zero matches is a valid empty
/// result; the index implementation raises NotFound when the provider
/// yields no match container at all.
pub async fn search(
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    query: &str,
    namespace: &str,
    top_k: usize,
    filter: Option<Map<String, Value>>,
) -> Result<SearchResponse> {
    if query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    let top_k = top_k.clamp(MIN_TOP_K, MAX_TOP_K);
    let started = Instant::now();

    // Single query embedding, not batched
    let vectors = embedder.embed(vec![query.to_string()]).await?;
    let query_vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| Error::Upstream("No embedding returned for query".to_string()))?;

    let matches = index.query(namespace, query_vector, top_k, filter).await?;
    debug!("Search returned {} matches", matches.len());

    Ok(SearchResponse {
        total_matches: matches.len(),
        matches,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Answer a question against the namespace with retrieval-augmented
/// generation. Fails with NotFound when no match carries usable content.
pub async fn answer(
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    completer: &dyn CompletionProvider,
    query: &str,
    namespace: &str,
    top_k: usize,
    filter: Option<Map<String, Value>>,
) -> Result<RagAnswer> {
    let started = Instant::now();
    let response = search(embedder, index, query, namespace, top_k, filter).await?;

    // Matches without retrievable content cannot be cited
    let sources: Vec<RankedMatch> = response
        .matches
        .into_iter()
        .filter(|m| match_content(m).is_some())
        .collect();

    if sources.is_empty() {
        return Err(Error::NotFound(
            "No relevant information found for this query".to_string(),
        ));
    }

    let context = build_context(&sources);
    let confidence = confidence_score(&sources);

    let user_prompt = format!("Context:\n{}\n\nQuestion: {}", context, query);
    let answer = completer.complete(SYSTEM_PROMPT, &user_prompt).await?;

    info!(
        "Answered query against namespace {} with {} sources (confidence {:.0})",
        namespace,
        sources.len(),
        confidence
    );

    Ok(RagAnswer {
        answer,
        sources,
        confidence,
        namespace: namespace.to_string(),
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

fn match_content(m: &RankedMatch) -> Option<&str> {
    m.metadata
        .get("content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn match_field<'a>(m: &'a RankedMatch, key: &str) -> Option<&'a str> {
    m.metadata.get(key).and_then(|v| v.as_str())
}

/// One labeled block per source, in rank order
fn build_context(sources: &[RankedMatch]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let title = match_field(source, "title").unwrap_or("Untitled");
            let heading = match match_field(source, "section") {
                Some(section) => format!("{} — {}", title, section),
                None => title.to_string(),
            };
            let url = match_field(source, "url").unwrap_or("");
            let content = match_content(source).unwrap_or("");
            format!(
                "[Source {}] {}\nURL: {}\nContent: {}",
                i + 1,
                heading,
                url,
                content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn confidence_score(sources: &[RankedMatch]) -> f32 {
    if sources.is_empty() {
        return 0.0;
    }
    let mean = sources.iter().map(|s| s.score).sum::<f32>() / sources.len() as f32;
    (mean * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::tests::FakeEmbedder;
    use crate::store::tests::FakeIndex;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeCompleter {
        pub prompts: Mutex<Vec<(String, String)>>,
    }

    impl FakeCompleter {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeCompleter {
        async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            Ok("Synthesized answer (Source 1).".to_string())
        }
    }

    fn ranked_match(id: &str, score: f32, content: Option<&str>) -> RankedMatch {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), json!("Guide"));
        metadata.insert("section".to_string(), json!("Install"));
        metadata.insert("url".to_string(), json!("https://example.com/docs/guide"));
        if let Some(content) = content {
            metadata.insert("content".to_string(), json!(content));
        }
        RankedMatch {
            id: id.to_string(),
            score,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let matches: Vec<RankedMatch> = (0..20)
            .map(|i| ranked_match(&format!("m{}", i), 0.9, Some("text")))
            .collect();
        let index = FakeIndex::with_matches(matches);
        let embedder = FakeEmbedder::new(8);

        let response = search(&embedder, &index, "how to install", "docs", 5, None)
            .await
            .unwrap();
        assert!(response.matches.len() <= 5);
        assert_eq!(response.total_matches, response.matches.len());
    }

    #[tokio::test]
    async fn test_search_zero_matches_is_ok() {
        let index = FakeIndex::new();
        let embedder = FakeEmbedder::new(8);

        let response = search(&embedder, &index, "anything", "docs", 5, None)
            .await
            .unwrap();
        assert!(response.matches.is_empty());
        assert_eq!(response.total_matches, 0);
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let index = FakeIndex::new();
        let embedder = FakeEmbedder::new(8);

        let err = search(&embedder, &index, "  ", "docs", 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    // Scenario: querying a namespace with zero stored vectors fails with a
    // NotFound error naming the missing information.
    #[tokio::test]
    async fn test_answer_empty_namespace_is_not_found() {
        let index = FakeIndex::new();
        let embedder = FakeEmbedder::new(8);
        let completer = FakeCompleter::new();

        let err = answer(&embedder, &index, &completer, "what is this", "docs", 5, None)
            .await
            .unwrap_err();

        match err {
            Error::NotFound(message) => {
                assert!(message.to_lowercase().contains("no relevant information"))
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_discards_contentless_matches() {
        let index = FakeIndex::with_matches(vec![
            ranked_match("a", 0.8, Some("usable text")),
            ranked_match("b", 0.7, None),
            ranked_match("c", 0.6, Some("")),
        ]);
        let embedder = FakeEmbedder::new(8);
        let completer = FakeCompleter::new();

        let result = answer(&embedder, &index, &completer, "question", "docs", 5, None)
            .await
            .unwrap();

        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].id, "a");
    }

    #[tokio::test]
    async fn test_answer_confidence_is_mean_score() {
        let index = FakeIndex::with_matches(vec![
            ranked_match("a", 0.8, Some("text a")),
            ranked_match("b", 0.6, Some("text b")),
        ]);
        let embedder = FakeEmbedder::new(8);
        let completer = FakeCompleter::new();

        let result = answer(&embedder, &index, &completer, "question", "docs", 5, None)
            .await
            .unwrap();

        assert!((result.confidence - 70.0).abs() < 0.01);
        assert!((0.0..=100.0).contains(&result.confidence));
        assert_eq!(result.namespace, "docs");
    }

    #[tokio::test]
    async fn test_answer_context_blocks_and_prompt() {
        let index = FakeIndex::with_matches(vec![ranked_match("a", 0.9, Some("install with cargo"))]);
        let embedder = FakeEmbedder::new(8);
        let completer = FakeCompleter::new();

        let result = answer(&embedder, &index, &completer, "how do I install?", "docs", 5, None)
            .await
            .unwrap();
        assert_eq!(result.answer, "Synthesized answer (Source 1).");

        let prompts = completer.prompts.lock().unwrap();
        let (system, user) = &prompts[0];
        assert!(system.contains("(Source N)"));
        assert!(user.contains("[Source 1] Guide — Install"));
        assert!(user.contains("URL: https://example.com/docs/guide"));
        assert!(user.contains("Content: install with cargo"));
        assert!(user.contains("Question: how do I install?"));
    }

    #[test]
    fn test_confidence_clamped() {
        let high = vec![ranked_match("a", 1.5, Some("x"))];
        assert_eq!(confidence_score(&high), 100.0);
        let negative = vec![ranked_match("a", -0.5, Some("x"))];
        assert_eq!(confidence_score(&negative), 0.0);
    }
}
