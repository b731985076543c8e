//! The facade a front end talks to.
//!
//! The [`RagPipeline`] exposes the two operations the UI layer needs:
//! [`build_index`](RagPipeline::build_index) (extract → chunk → embed → store) and
//! [`answer`](RagPipeline::answer) (embed → retrieve → synthesize). The index is an
//! explicit handle owned by the caller's session; the pipeline itself holds no state
//! between calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{PdfSource, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().top_k(4).build()?)
//!     .embedding_provider(embedder)
//!     .language_model(model)
//!     .build()?;
//!
//! let index = pipeline.build_index(&[PdfSource::from(path)]).await?;
//! let answer = pipeline.answer("What is the notice period?", &index, 10).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveCharacterSplitter};
use crate::config::RagConfig;
use crate::document::{Chunk, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{ExtractionPolicy, PdfExtractor, PdfSource};
use crate::index::VectorIndex;
use crate::llm::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::synthesis::{Answer, AnswerKind, AnswerSynthesizer, QueryState, QueryTracker};

/// Stateless orchestration of extraction, indexing and answering.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    language_model: Arc<dyn LanguageModel>,
    extractor: PdfExtractor,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl RagPipeline {
    /// See [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The provider shared by indexing and querying.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    pub fn language_model(&self) -> &Arc<dyn LanguageModel> {
        &self.language_model
    }

    /// Build a fresh index from PDF sources using the configured chunk size and overlap.
    ///
    /// # Errors
    ///
    /// - [`RagError::ExtractionError`] if a source is unreadable (fail-fast policy)
    /// - [`RagError::EmbeddingError`] if any chunk fails to embed
    pub async fn build_index(&self, sources: &[PdfSource]) -> Result<VectorIndex> {
        self.build_index_with(sources, self.config.chunk_size, self.config.chunk_overlap).await
    }

    /// Build a fresh index from PDF sources with explicit chunking parameters.
    ///
    /// # Errors
    ///
    /// As [`build_index`](Self::build_index), plus [`RagError::ConfigError`] for an
    /// invalid `chunk_size`/`chunk_overlap` pair.
    pub async fn build_index_with(
        &self,
        sources: &[PdfSource],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<VectorIndex> {
        let splitter = RecursiveCharacterSplitter::new(chunk_size, chunk_overlap)?;

        let documents = self.extractor.extract_all(sources).await?;
        for document in documents.iter().filter(|document| document.is_empty()) {
            warn!(source = %document.source, "no extractable text, possibly a scanned PDF");
        }
        let chunks: Vec<Chunk> =
            documents.iter().flat_map(|document| splitter.chunk_document(document)).collect();
        info!(
            document_count = documents.len(),
            chunk_count = chunks.len(),
            chunk_size,
            chunk_overlap,
            "chunked documents"
        );

        self.index_chunks(chunks).await
    }

    /// Build a fresh index from already chunked text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if any chunk fails to embed.
    pub async fn index_chunks(
        &self,
        chunks: impl IntoIterator<Item = Chunk>,
    ) -> Result<VectorIndex> {
        let mut builder = VectorIndex::builder()
            .embedding_provider(Arc::clone(&self.embedding_provider))
            .embed_batch_size(self.config.embed_batch_size);
        if let Some(timeout) = self.config.request_timeout() {
            builder = builder.request_timeout(timeout);
        }
        let index = builder.build()?;
        index.add(chunks).await.inspect_err(|e| error!(error = %e, "index build failed"))?;
        Ok(index)
    }

    /// Retrieve up to `k` chunks for `question` with the configured strategy.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve`].
    pub async fn retrieve(
        &self,
        question: &str,
        index: &VectorIndex,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(index, question, k).await
    }

    /// Answer `question` from `index` using up to `k` retrieved chunks.
    ///
    /// Follows `Idle → Embedding → Retrieving → (Done(no context) | Synthesizing → Done)`;
    /// any failure ends the query in `Failed` and is returned to the caller.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for an empty question, `k == 0`, or an index built with
    ///   a different embedding model
    /// - [`RagError::EmbeddingError`] if the question cannot be embedded
    /// - [`RagError::GenerationError`] if the language model fails
    pub async fn answer(&self, question: &str, index: &VectorIndex, k: usize) -> Result<Answer> {
        let mut tracker = QueryTracker::new();
        let result = self.run_query(&mut tracker, question, index, k).await;
        let result = tracker.track(result);
        debug!(state = ?tracker.state(), "query finished");
        result
    }

    /// Answer with the configured `top_k`.
    ///
    /// # Errors
    ///
    /// See [`answer`](Self::answer).
    pub async fn ask(&self, question: &str, index: &VectorIndex) -> Result<Answer> {
        self.answer(question, index, self.config.top_k).await
    }

    async fn run_query(
        &self,
        tracker: &mut QueryTracker,
        question: &str,
        index: &VectorIndex,
        k: usize,
    ) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::ConfigError("question must not be empty".to_string()));
        }
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        self.retriever.check_compatible(index)?;

        tracker.advance(QueryState::Embedding);
        let chunks = if index.is_empty().await {
            tracker.advance(QueryState::Retrieving);
            Vec::new()
        } else {
            let query_embedding = self.retriever.embed_query(question).await?;
            tracker.advance(QueryState::Retrieving);
            self.retriever.select(index, &query_embedding, k).await?
        };

        if chunks.is_empty() {
            tracker.advance(QueryState::Done(AnswerKind::NoContext));
            return Ok(Answer::no_context());
        }

        tracker.advance(QueryState::Synthesizing);
        let answer = self.synthesizer.answer(question, &chunks).await?;
        tracker.advance(QueryState::Done(answer.kind));
        Ok(answer)
    }
}

/// Assembles a [`RagPipeline`].
///
/// The embedding provider and language model are required; the configuration defaults to
/// [`RagConfig::default()`] and the template to the grounded QA template (with citations
/// when `cite_sources` is set).
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::interactive())
///     .embedding_provider(embedder)
///     .language_model(model)
///     .prompt_template(PromptTemplate::new("...{context}...{question}...")?) // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    language_model: Option<Arc<dyn LanguageModel>>,
    prompt_template: Option<PromptTemplate>,
    extraction_policy: ExtractionPolicy,
}

impl RagPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for both indexing and querying.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// The model that writes answers.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Override the prompt template.
    pub fn prompt_template(mut self, template: PromptTemplate) -> Self {
        self.prompt_template = Some(template);
        self
    }

    /// Set what happens when one PDF in a batch is unreadable.
    pub fn extraction_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.extraction_policy = policy;
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and required parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required part is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let language_model = self
            .language_model
            .ok_or_else(|| RagError::ConfigError("language_model is required".to_string()))?;

        let template = match self.prompt_template {
            Some(template) => {
                let cite = template.cites_sources() || config.cite_sources;
                template.with_citations(cite)
            }
            None if config.cite_sources => PromptTemplate::grounded_qa_with_citations(),
            None => PromptTemplate::grounded_qa(),
        };

        let mut retriever = Retriever::new(Arc::clone(&embedding_provider), config.strategy);
        let mut synthesizer = AnswerSynthesizer::new(Arc::clone(&language_model), template);
        if let Some(timeout) = config.request_timeout() {
            retriever = retriever.with_request_timeout(timeout);
            synthesizer = synthesizer.with_request_timeout(timeout);
        }

        Ok(RagPipeline {
            extractor: PdfExtractor::new().with_policy(self.extraction_policy),
            config,
            embedding_provider,
            language_model,
            retriever,
            synthesizer,
        })
    }
}
