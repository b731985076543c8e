//! Language-model capability used by the answer synthesizer.

use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out language model.
///
/// One call per question, no streaming. Implementations map every service failure to
/// [`RagError::GenerationError`](crate::RagError::GenerationError).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for a fully rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model name, used in logs and error messages.
    fn name(&self) -> &str;
}
