//! Maps the `--provider` choice and the environment onto library providers.

use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use pdfqa_rag::gemini::{GeminiChatModel, GeminiEmbeddingProvider};
use pdfqa_rag::huggingface::{HuggingFaceEmbeddingProvider, HuggingFaceTextGenerator};
use pdfqa_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
use pdfqa_rag::{EmbeddingProvider, LanguageModel, ServiceConfig};

pub const HUGGINGFACE_TOKEN_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const GOOGLE_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Which hosted service answers questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Hugging Face Inference API (bge embeddings, flan-t5 answers).
    #[default]
    Huggingface,
    /// OpenAI embeddings and chat completions.
    Openai,
    /// Google Gemini embeddings and generateContent.
    Gemini,
}

/// Model overrides from the command line. Empty means the provider default.
#[derive(Debug, Clone, Default)]
pub struct ModelChoice {
    pub embedding_model: Option<String>,
    pub chat_model: Option<String>,
}

pub struct Services {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub model: Arc<dyn LanguageModel>,
}

fn env_key(var: &str) -> anyhow::Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{var} is not set (export it or add it to .env)"))
}

impl Provider {
    /// Environment variable holding this provider's credential.
    pub fn key_var(self) -> &'static str {
        match self {
            Self::Huggingface => HUGGINGFACE_TOKEN_VAR,
            Self::Openai => OPENAI_KEY_VAR,
            Self::Gemini => GOOGLE_KEY_VAR,
        }
    }

    pub fn connect(self, models: &ModelChoice) -> anyhow::Result<Services> {
        let key = env_key(self.key_var())?;
        let embedding = ServiceConfig::new(
            key.clone(),
            models.embedding_model.clone().unwrap_or_default(),
        );
        let chat = ServiceConfig::new(key, models.chat_model.clone().unwrap_or_default());

        let services = match self {
            Self::Huggingface => Services {
                embedder: Arc::new(HuggingFaceEmbeddingProvider::new(embedding)?),
                model: Arc::new(HuggingFaceTextGenerator::new(chat)?),
            },
            Self::Openai => Services {
                embedder: Arc::new(OpenAIEmbeddingProvider::new(embedding)?),
                model: Arc::new(OpenAIChatModel::new(chat)?),
            },
            Self::Gemini => Services {
                embedder: Arc::new(GeminiEmbeddingProvider::new(embedding)?),
                model: Arc::new(GeminiChatModel::new(chat)?),
            },
        };

        tracing::info!(
            provider = ?self,
            embedding_model = services.embedder.model_id(),
            model = services.model.name(),
            "connected providers"
        );
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_provider_reads_its_own_key() {
        assert_eq!(Provider::Gemini.key_var(), "GOOGLE_API_KEY");
        assert_eq!(Provider::Openai.key_var(), "OPENAI_API_KEY");
        assert_eq!(Provider::Huggingface.key_var(), "HUGGINGFACEHUB_API_TOKEN");
    }

    #[test]
    fn gemini_is_selectable_by_name() {
        assert_eq!(Provider::from_str("gemini", true).unwrap(), Provider::Gemini);
    }
}
