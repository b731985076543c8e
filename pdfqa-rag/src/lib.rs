//! Question answering over PDF documents.
//!
//! This crate provides:
//! - Per-page PDF text extraction ([`PdfExtractor`])
//! - Recursive, separator-aware chunking ([`RecursiveCharacterSplitter`])
//! - An embedding index with batched, atomic builds ([`VectorIndex`])
//! - Similarity and maximal-marginal-relevance retrieval ([`Retriever`])
//! - Grounded answer synthesis that declares out-of-scope questions ([`AnswerSynthesizer`])
//! - A [`RagPipeline`] tying the stages together
//!
//! Remote providers live behind the `gemini`, `openai` and `huggingface` features.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod inmemory;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod similarity;
pub mod synthesis;
pub mod vectorstore;

mod timeout;

#[cfg(any(feature = "openai", feature = "huggingface", feature = "gemini"))]
mod http;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "huggingface")]
pub mod huggingface;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveCharacterSplitter};
pub use config::{RagConfig, RagConfigBuilder, RetrievalStrategy, ServiceConfig};
pub use document::{Chunk, Document, Page, ScoredChunk};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, RagError, Result};
pub use extract::{ExtractionPolicy, PdfExtractor, PdfSource};
pub use index::{VectorIndex, VectorIndexBuilder};
pub use inmemory::InMemoryVectorStore;
pub use llm::LanguageModel;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{NOT_FOUND_MARKER, PromptTemplate};
pub use retriever::{Retriever, maximal_marginal_relevance};
pub use similarity::cosine_similarity;
pub use synthesis::{
    Answer, AnswerKind, AnswerSynthesizer, NO_CONTEXT_ANSWER, QueryState, QueryTracker,
};
pub use vectorstore::{StoreHit, StoredChunk, VectorStore};
