//! OpenAI providers, enabled by the `openai` feature.
//!
//! Any server speaking the same REST dialect works too; point
//! [`ServiceConfig::with_base_url`] at it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{ServiceClient, base_url};
use crate::llm::LanguageModel;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Width of vectors from [`DEFAULT_EMBEDDING_MODEL`].
const DEFAULT_EMBEDDING_WIDTH: usize = 1536;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const SERVICE: &str = "OpenAI";

fn connect(
    config: ServiceConfig,
    path: &str,
    fallback_model: &str,
) -> Result<(ServiceClient, String)> {
    if config.api_key.is_empty() {
        return Err(RagError::ConfigError("OpenAI API key must not be empty".into()));
    }
    let url = format!("{}/{path}", base_url(config.base_url.as_deref(), OPENAI_API_BASE));
    let model = if config.model.is_empty() { fallback_model.to_string() } else { config.model };
    Ok((ServiceClient::new(SERVICE, url, config.api_key), model))
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error(body: &str) -> Option<String> {
    serde_json::from_str::<ApiError>(body).ok().map(|e| e.error.message)
}

/// Vectors from the `/embeddings` endpoint.
pub struct OpenAIEmbeddingProvider {
    http: ServiceClient,
    model: String,
    width: usize,
    shortened: bool,
}

impl OpenAIEmbeddingProvider {
    /// An empty model name selects [`DEFAULT_EMBEDDING_MODEL`].
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, "embeddings", DEFAULT_EMBEDDING_MODEL)?;
        Ok(Self { http, model, width: DEFAULT_EMBEDDING_WIDTH, shortened: false })
    }

    /// Ask the service for vectors shortened to `dims` entries.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.width = dims;
        self.shortened = true;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<IndexedVector>,
}

#[derive(Deserialize)]
struct IndexedVector {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(RagError::EmbeddingError {
                provider: SERVICE.into(),
                message: "expected exactly one vector".into(),
            }),
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, texts = texts.len(), "requesting OpenAI embeddings");

        let body = EmbeddingsBody {
            model: &self.model,
            input: texts,
            dimensions: self.shortened.then_some(self.width),
        };
        let mut reply: EmbeddingsReply = self
            .http
            .post(&body, api_error)
            .await
            .map_err(|message| RagError::EmbeddingError { provider: SERVICE.into(), message })?;

        // Entries carry their input position; ordering of the array is not guaranteed.
        reply.data.sort_unstable_by_key(|v| v.index);
        Ok(reply.data.into_iter().map(|v| v.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.width
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Answers from `/chat/completions`, sending the prompt as one user turn.
pub struct OpenAIChatModel {
    http: ServiceClient,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAIChatModel {
    /// An empty model name selects [`DEFAULT_CHAT_MODEL`]. Temperature starts at 0.3.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let (http, model) = connect(config, "chat/completions", DEFAULT_CHAT_MODEL)?;
        Ok(Self { http, model, temperature: 0.3, max_tokens: None })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the reply length.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Turn<'a>; 1],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionReply {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "requesting OpenAI completion"
        );

        let failed = |message: String| RagError::GenerationError {
            provider: format!("{SERVICE}/{}", self.model),
            message,
        };
        let body = CompletionBody {
            model: &self.model,
            messages: [Turn { role: "user", content: prompt }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let reply: CompletionReply = self.http.post(&body, api_error).await.map_err(failed)?;

        reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| failed("reply contained no message".into()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_a_config_error() {
        let err = OpenAIChatModel::new(ServiceConfig::new("", "")).err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn shortened_vectors_change_reported_width() {
        let provider = OpenAIEmbeddingProvider::new(ServiceConfig::new("sk-x", "")).unwrap();
        assert_eq!(provider.dimensions(), DEFAULT_EMBEDDING_WIDTH);
        assert_eq!(provider.model_id(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(provider.with_dimensions(256).dimensions(), 256);
    }

    #[test]
    fn error_message_is_pulled_from_the_body() {
        let body = r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#;
        assert_eq!(api_error(body).as_deref(), Some("bad key"));
        assert_eq!(api_error("gateway timeout"), None);
    }
}
