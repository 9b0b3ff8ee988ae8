//! The language-model seam and its implementations.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{ExtractError, ExtractResult};

/// Abstraction over the language model used for structured extraction.
///
/// Implementations wrap a specific provider and return raw response
/// text; prompt construction and parsing live in this module's siblings.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Send a prompt and return the model's text response.
    async fn complete(&self, prompt: &str) -> ExtractResult<String>;

    /// Implementation name, for logs.
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Model backed by an OpenAI-compatible chat endpoint (Ollama serves
/// one at `/v1/chat/completions`).
pub struct ChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatModel {
    /// Build from pipeline config.
    pub fn new(config: &PipelineConfig) -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ExtractError::Invocation(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.model_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ExtractionModel for ChatModel {
    async fn complete(&self, prompt: &str) -> ExtractResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        debug!(model = %self.model, prompt_bytes = prompt.len(), "model invocation starting");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Invocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Invocation(format!(
                "model endpoint returned HTTP {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Invocation(format!("invalid response envelope: {e}")))?;

        // First non-empty text block.
        parsed
            .choices
            .into_iter()
            .map(|c| c.message.content)
            .find(|content| !content.trim().is_empty())
            .ok_or(ExtractError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "chat"
    }
}

/// Mock model for deterministic testing: bypasses any network call and
/// returns one fixed synthetic listing.
#[derive(Default)]
pub struct MockModel;

impl MockModel {
    /// Create a new mock model.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtractionModel for MockModel {
    async fn complete(&self, _prompt: &str) -> ExtractResult<String> {
        Ok(r#"{
            "properties": [
                {
                    "title": "Synthetic Test Property",
                    "price": 100000000,
                    "currency": "CLP",
                    "address": "Calle Falsa 123",
                    "city": "Santiago",
                    "region": "Metropolitana",
                    "neighborhood": "Providencia",
                    "bedrooms": 3,
                    "bathrooms": 2,
                    "area_m2": 95.0,
                    "property_type": "apartment",
                    "description": "Deterministic record produced in mock mode",
                    "source_url": "https://example.com/mock/1"
                }
            ]
        }"#
        .to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_model_extracts_first_nonempty_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"content": ""}},
                    {"message": {"content": "{\"properties\": []}"}}
                ]
            })))
            .mount(&server)
            .await;

        let mut config = PipelineConfig::default();
        config.model_base_url = server.uri();
        let model = ChatModel::new(&config).unwrap();

        let text = model.complete("prompt").await.unwrap();
        assert_eq!(text, "{\"properties\": []}");
    }

    #[tokio::test]
    async fn test_chat_model_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = PipelineConfig::default();
        config.model_base_url = server.uri();
        let model = ChatModel::new(&config).unwrap();

        let err = model.complete("prompt").await.unwrap_err();
        assert!(matches!(err, ExtractError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_mock_model_is_deterministic() {
        let model = MockModel::new();
        let a = model.complete("x").await.unwrap();
        let b = model.complete("y").await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("Synthetic Test Property"));
    }
}
