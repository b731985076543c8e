//! Answer synthesis from retrieved chunks.
//!
//! The [`AnswerSynthesizer`] renders one grounded prompt per question and calls the
//! language model exactly once. When retrieval found nothing it answers with
//! [`NO_CONTEXT_ANSWER`] and never calls the model.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::document::ScoredChunk;
use crate::error::{ErrorKind, RagError, Result};
use crate::llm::LanguageModel;
use crate::prompt::{NOT_FOUND_MARKER, PromptTemplate};
use crate::timeout::with_timeout;

/// Answer returned when no chunk was retrieved.
pub const NO_CONTEXT_ANSWER: &str = "No relevant content was found in the uploaded documents.";

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// The language model answered from retrieved context.
    Generated,
    /// Retrieval was empty; the fixed no-context answer was returned.
    NoContext,
}

/// The result of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// The chunks the answer was grounded on, in retrieval order.
    pub sources: Vec<ScoredChunk>,
    /// How the answer was produced.
    pub kind: AnswerKind,
}

impl Answer {
    /// The fixed answer for an empty retrieval result.
    pub fn no_context() -> Self {
        Self {
            text: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
            kind: AnswerKind::NoContext,
        }
    }

    /// True if the model declared the question out of scope for the documents.
    pub fn is_not_found(&self) -> bool {
        self.kind == AnswerKind::NoContext || self.text.contains(NOT_FOUND_MARKER)
    }
}

/// Per-query progress. States only move forward; terminal states are `Done` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Embedding,
    Retrieving,
    Synthesizing,
    Done(AnswerKind),
    Failed(ErrorKind),
}

impl QueryState {
    /// Whether the query has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Embedding => 1,
            Self::Retrieving => 2,
            Self::Synthesizing => 3,
            Self::Done(_) | Self::Failed(_) => 4,
        }
    }
}

/// Tracks the state of one query and logs each transition.
#[derive(Debug)]
pub struct QueryTracker {
    state: QueryState,
}

impl QueryTracker {
    /// Start in [`QueryState::Idle`].
    pub fn new() -> Self {
        Self { state: QueryState::Idle }
    }

    /// The current state.
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Move to `next`. Transitions out of a terminal state, or backwards, are ignored.
    pub fn advance(&mut self, next: QueryState) {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            debug!(from = ?self.state, to = ?next, "ignored query state transition");
            return;
        }
        debug!(from = ?self.state, to = ?next, "query state");
        self.state = next;
    }

    /// Record the outcome of a step, moving to `Failed` on error.
    pub fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.advance(QueryState::Failed(e.kind()));
        }
        result
    }
}

impl Default for QueryTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a question and its retrieved chunks into an [`Answer`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{AnswerSynthesizer, PromptTemplate};
///
/// let synthesizer = AnswerSynthesizer::new(model, PromptTemplate::grounded_qa());
/// let answer = synthesizer.answer("What is the capital of France?", &chunks).await?;
/// ```
#[derive(Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    request_timeout: Option<Duration>,
}

impl AnswerSynthesizer {
    /// Create a synthesizer for `model` using `template`.
    pub fn new(model: Arc<dyn LanguageModel>, template: PromptTemplate) -> Self {
        Self { model, template, request_timeout: None }
    }

    /// Bound the model call by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The template in use.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Build the prompt for `question` over `chunks`.
    pub fn build_prompt(&self, question: &str, chunks: &[ScoredChunk]) -> String {
        let context = self.template.render_context(chunks);
        self.template.render(&context, question.trim())
    }

    /// Answer `question` from `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if the model call fails, times out, or returns
    /// only whitespace.
    pub async fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Result<Answer> {
        if chunks.is_empty() {
            info!("no context retrieved, returning fixed answer");
            return Ok(Answer::no_context());
        }

        let prompt = self.build_prompt(question, chunks);
        debug!(
            model = self.model.name(),
            prompt_len = prompt.len(),
            chunk_count = chunks.len(),
            "generating answer"
        );

        let name = self.model.name().to_string();
        let raw = with_timeout(self.request_timeout, self.model.generate(&prompt), |limit| {
            RagError::GenerationError {
                provider: name.clone(),
                message: format!("generation timed out after {limit:?}"),
            }
        })
        .await
        .inspect_err(|e| error!(error = %e, "generation failed"))?;

        let text = raw.trim();
        if text.is_empty() {
            error!(model = %name, "model returned an empty answer");
            return Err(RagError::GenerationError {
                provider: name,
                message: "model returned an empty answer".to_string(),
            });
        }

        info!(model = %name, answer_len = text.len(), "answer generated");
        Ok(Answer { text: text.to_string(), sources: chunks.to_vec(), kind: AnswerKind::Generated })
    }
}
