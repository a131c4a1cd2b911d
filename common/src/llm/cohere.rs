use crate::error::{Result, TabchatError};
use crate::llm::client::{ChatMessage, GenerationClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.cohere.com/v1/chat";
const DEFAULT_MODEL: &str = "command-r-08-2024";

/// Cohere chat API client. Temperature is pinned to zero so repeated
/// identical questions lean toward identical expressions.
pub struct CohereClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    preamble: &'a str,
    chat_history: Vec<HistoryEntry<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    role: &'static str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

impl CohereClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(api_key, timeout, DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_endpoint(api_key: String, timeout: Duration, endpoint: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TabchatError::GenerationUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            endpoint,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerationClient for CohereClient {
    #[tracing::instrument(skip(self, preamble, history, question), fields(history_len = history.len()))]
    async fn generate(
        &self,
        preamble: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            message: question,
            preamble,
            chat_history: history
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role.as_str(),
                    message: &m.content,
                })
                .collect(),
            temperature: 0.0,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TabchatError::GenerationUnavailable("generation timed out".to_string())
                } else {
                    TabchatError::GenerationUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "generation request rejected");
            return Err(TabchatError::GenerationUnavailable(format!(
                "provider returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TabchatError::GenerationUnavailable(e.to_string()))?;

        tracing::debug!(chars = parsed.text.len(), "generation completed");
        Ok(parsed.text)
    }
}
