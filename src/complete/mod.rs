//! Completion provider for answer synthesis

use crate::config::CompletionConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait implemented by concrete completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions client
pub struct HttpCompleter {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl HttpCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = config.api_key() {
            let auth = format!("Bearer {}", api_key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|_| Error::Config("invalid completion API key".to_string()))?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build completion client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", config.url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompleter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Upstream(format!(
                "Completion request failed ({}): {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            Error::Upstream(format!("Failed to parse completion response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Upstream("Completion response had no choices".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}
