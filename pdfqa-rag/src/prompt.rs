//! Prompt templates for grounded question answering.
//!
//! A template is plain text with two placeholders, `{context}` and `{question}`.
//! Rendering is pure substitution; the placeholder set is validated once, when the
//! template is created.

use crate::document::ScoredChunk;
use crate::error::{RagError, Result};

/// Marker the model is told to answer with when the question is not covered by the context.
pub const NOT_FOUND_MARKER: &str = "This question is irrelevant to the document";

const CONTEXT: &str = "context";
const QUESTION: &str = "question";

const GROUNDED_QA: &str = "\
Only use the context below to answer the question provided. If the question is not relevant \
to the context, explicitly state \"This question is irrelevant to the document\".
Do not make up an answer.

Context:
{context}

Question:
{question}

Only return the answer and nothing else.
Answer:
";

const GROUNDED_QA_WITH_CITATIONS: &str = "\
Only use the context below to answer the question provided. If the question is not relevant \
to the context, explicitly state \"This question is irrelevant to the document\".
Do not make up an answer. Each context passage is labelled [n]; end your answer with the \
label of the passage that supports it, for example [1].

Context:
{context}

Question:
{question}

Only return the answer and its citation, nothing else.
Answer:
";

/// A validated prompt template.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::PromptTemplate;
///
/// let template = PromptTemplate::new("Context: {context}\nQ: {question}\nA:")?;
/// let prompt = template.render("Paris is the capital of France.", "Capital of France?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    citations: bool,
}

impl PromptTemplate {
    /// Create a template from text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless both `{context}` and `{question}` appear
    /// and no other `{name}` placeholder does.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let names = placeholders(&template);

        for required in [CONTEXT, QUESTION] {
            if !names.contains(&required) {
                return Err(RagError::ConfigError(format!(
                    "prompt template is missing the {{{required}}} placeholder"
                )));
            }
        }
        if let Some(unknown) = names.iter().find(|n| **n != CONTEXT && **n != QUESTION) {
            return Err(RagError::ConfigError(format!(
                "prompt template has unknown placeholder {{{unknown}}}"
            )));
        }

        Ok(Self { template, citations: false })
    }

    /// The default template: answer only from context, otherwise state [`NOT_FOUND_MARKER`].
    pub fn grounded_qa() -> Self {
        Self { template: GROUNDED_QA.to_string(), citations: false }
    }

    /// Like [`grounded_qa`](Self::grounded_qa), but the model must cite the `[n]` label of
    /// the supporting passage.
    pub fn grounded_qa_with_citations() -> Self {
        Self { template: GROUNDED_QA_WITH_CITATIONS.to_string(), citations: true }
    }

    /// Whether context passages are labelled for citation.
    pub fn cites_sources(&self) -> bool {
        self.citations
    }

    /// Label context passages with `[n]` when rendering.
    pub fn with_citations(mut self, citations: bool) -> Self {
        self.citations = citations;
        self
    }

    /// Substitute the placeholders.
    pub fn render(&self, context: &str, question: &str) -> String {
        // Single pass so that braces inside the substituted text are never re-expanded.
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}').map(|close| (&after[..close], close)) {
                Some((CONTEXT, close)) => {
                    out.push_str(context);
                    rest = &after[close + 1..];
                }
                Some((QUESTION, close)) => {
                    out.push_str(question);
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Render retrieved chunks as the context block.
    ///
    /// Passages are separated by blank lines; with citations each one is prefixed by its
    /// `[n]` label and location.
    pub fn render_context(&self, chunks: &[ScoredChunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, scored)| {
                if !self.citations {
                    return scored.chunk.text.clone();
                }
                match scored.chunk.location() {
                    Some(location) => format!("[{}] ({location}) {}", i + 1, scored.chunk.text),
                    None => format!("[{}] {}", i + 1, scored.chunk.text),
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::grounded_qa()
    }
}

/// Names of `{identifier}` placeholders in order of appearance.
fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    names.push(name);
                    rest = &after[close + 1..];
                } else {
                    rest = after;
                }
            }
            None => break,
        }
    }
    names
}
