//! Data types for extracted documents, chunks, and retrieval results.

use serde::{Deserialize, Serialize};

/// One page of text extracted from a PDF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// The decoded text of the page.
    pub text: String,
}

/// A PDF source after text extraction.
///
/// Lives only until it has been chunked; it is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// The file path or upload name the document came from.
    pub source: String,
    /// Pages in page order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Concatenate page texts in page order, exactly as decoded.
    pub fn text(&self) -> String {
        self.pages.iter().map(|p| p.text.as_str()).collect()
    }

    /// Returns true when no page carries any text.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// A bounded span of text used as the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// The source the chunk was cut from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// The page the chunk was cut from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Chunk {
    /// Create a chunk without source information.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), source: None, page: None }
    }

    /// Attach the source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Human-readable location such as `report.pdf p.3`, when known.
    pub fn location(&self) -> Option<String> {
        match (&self.source, self.page) {
            (Some(source), Some(page)) => Some(format!("{source} p.{page}")),
            (Some(source), None) => Some(source.clone()),
            (None, Some(page)) => Some(format!("p.{page}")),
            (None, None) => None,
        }
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A retrieved [`Chunk`] paired with its relevance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
