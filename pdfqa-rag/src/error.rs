//! Error types for the `pdfqa-rag` crate.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while building an index or answering a question.
#[derive(Debug, Error)]
pub enum RagError {
    /// A PDF source could not be read or is not a valid PDF.
    #[error("Extraction error ({source_name}): {message}")]
    ExtractionError {
        /// The path or name of the offending source.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error (chunk sizes, `k`, lambda, templates, wiring).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A query could not be served by the vector index.
    #[error("Index error: {0}")]
    IndexError(String),

    /// The language model call failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The language model that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// The plain taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExtractionError { .. } => ErrorKind::Extraction,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::EmbeddingError { .. } => ErrorKind::Embedding,
            Self::IndexError(_) => ErrorKind::Index,
            Self::GenerationError { .. } => ErrorKind::Generation,
        }
    }
}

/// Fieldless view of [`RagError`], used by the query state machine and by callers that
/// only need to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Extraction,
    Config,
    Embedding,
    Index,
    Generation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extraction => "extraction",
            Self::Config => "config",
            Self::Embedding => "embedding",
            Self::Index => "index",
            Self::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
