//! OpenAI-compatible embeddings HTTP backend

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = config.api_key() {
            let auth = format!("Bearer {}", api_key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|_| Error::Config("invalid embedding API key".to_string()))?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build embedding client: {}", e)))?;

        let endpoint = format!("{}/embeddings", config.url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: &texts,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Upstream(format!(
                "Embeddings request failed ({}): {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::Upstream(format!("Failed to parse embedding response: {}", e))
        })?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(Error::Upstream(format!(
                "Provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
