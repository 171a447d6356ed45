//! OpenAI embedding and chat providers.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::generation::{GenerationProvider, GenerationRequest};
use crate::history::Role;

/// The default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// The default sampling temperature for chat calls.
const DEFAULT_TEMPERATURE: f32 = 0.4;

fn api_key_from_env(provider: &str) -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| MemoryError::provider(provider, "OPENAI_API_KEY environment variable not set"))
}

fn check_api_key(provider: &str, api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(MemoryError::provider(provider, "API key must not be empty"));
    }
    Ok(())
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into a provider failure carrying the API's message.
async fn api_error(provider: &str, response: reqwest::Response) -> MemoryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(provider, %status, "API error");
    MemoryError::provider(provider, format!("API returned {status}: {detail}"))
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use mentor_memory::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key("OpenAI", &api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("OpenAI")?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::provider("OpenAI", "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "OpenAI",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenAI", error = %e, "request failed");
                MemoryError::provider("OpenAI", format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error("OpenAI", response).await);
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI", error = %e, "failed to parse response");
            MemoryError::provider("OpenAI", format!("failed to parse response: {e}"))
        })?;

        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`GenerationProvider`] backed by the OpenAI chat completions API.
///
/// Defaults to `gpt-4o-mini` at temperature 0.4.
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAIChatProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key("OpenAI chat", &api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("OpenAI chat")?)
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn openai_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Human => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            provider = "OpenAI chat",
            model = %self.model,
            messages = request.messages.len(),
            "chat request"
        );

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: request
                .messages
                .iter()
                .map(|m| ChatRequestMessage { role: openai_role(m.role), content: &m.content })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "OpenAI chat", error = %e, "request failed");
                MemoryError::provider("OpenAI chat", format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error("OpenAI chat", response).await);
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = "OpenAI chat", error = %e, "failed to parse response");
            MemoryError::provider("OpenAI chat", format!("failed to parse response: {e}"))
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| MemoryError::provider("OpenAI chat", "API returned no content"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("").is_err());
        assert!(OpenAIChatProvider::new("").is_err());
    }

    #[test]
    fn roles_map_to_openai_names() {
        assert_eq!(openai_role(Role::Human), "user");
        assert_eq!(openai_role(Role::Assistant), "assistant");
        assert_eq!(openai_role(Role::System), "system");
    }

    #[test]
    fn dimension_override_is_reported() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_dimensions(256);
        assert_eq!(provider.dimensions(), 256);
    }
}
