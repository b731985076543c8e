//! Deterministic stand-ins for embedding services and language models, plus an in-memory
//! PDF builder.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};
use pdfqa_rag::{EmbeddingProvider, LanguageModel, NOT_FOUND_MARKER, RagError, Result};

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

/// Bag-of-words embedder over a fixed vocabulary: dimension `i` counts occurrences of
/// `vocabulary[i]`.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    model_id: String,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self::named("keyword-test", vocabulary)
    }

    pub fn named(model_id: &str, vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            model_id: model_id.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed`/`embed_batch` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for token in tokens(text) {
            if let Some(i) = self.vocabulary.iter().position(|w| *w == token) {
                vector[i] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Keyword embedder that hangs for `delay` on every call while stalled.
pub struct SlowEmbedder {
    inner: KeywordEmbedder,
    delay: Duration,
    stalled: AtomicBool,
}

impl SlowEmbedder {
    /// Starts stalled.
    pub fn new(vocabulary: &[&str], delay: Duration) -> Self {
        Self { inner: KeywordEmbedder::new(vocabulary), delay, stalled: AtomicBool::new(true) }
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn wait(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.wait().await;
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.wait().await;
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Embedder whose service is always down.
pub struct FailingEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".into(),
            message: "service unavailable".into(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// Returns a fixed reply and counts calls.
pub struct CountingModel {
    reply: String,
    calls: AtomicUsize,
}

impl CountingModel {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for CountingModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Always fails with a generation error.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::GenerationError {
            provider: "failing".into(),
            message: "model overloaded".into(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Never answers within any reasonable deadline.
pub struct SlowModel {
    pub delay: Duration,
}

#[async_trait]
impl LanguageModel for SlowModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("too late".to_string())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Answers with the first context sentence sharing a keyword (five letters or more) with
/// the question, or with the not-found marker when there is none.
pub struct GroundedEchoModel;

impl GroundedEchoModel {
    fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
        let Some(from) = prompt.find(start).map(|i| i + start.len()) else { return "" };
        let rest = &prompt[from..];
        rest.find(end).map_or(rest, |to| &rest[..to])
    }
}

#[async_trait]
impl LanguageModel for GroundedEchoModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let context = Self::section(prompt, "Context:\n", "\n\nQuestion:");
        let question = Self::section(prompt, "Question:\n", "\n\n");
        let keywords: Vec<String> = tokens(question).filter(|t| t.chars().count() >= 5).collect();

        let answer = context
            .split(['.', '\n'])
            .map(str::trim)
            .find(|sentence| tokens(sentence).any(|t| keywords.contains(&t)));

        Ok(match answer {
            Some(sentence) => format!("{sentence}."),
            None => NOT_FOUND_MARKER.to_string(),
        })
    }

    fn name(&self) -> &str {
        "grounded-echo"
    }
}

/// Build a PDF with one page per entry of `pages`, each showing its text in Courier.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode content")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}
