//! PDF text extraction.
//!
//! Uses `lopdf` to load each source and decode its text page by page. Decoding is CPU
//! bound, so it runs on the blocking pool.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{Document, Page};
use crate::error::{RagError, Result};

/// A PDF handed over by the upload layer.
#[derive(Debug, Clone)]
pub enum PdfSource {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory upload.
    Bytes {
        /// Display name of the upload (usually the original file name).
        name: String,
        /// Raw PDF bytes.
        data: Vec<u8>,
    },
}

impl PdfSource {
    /// Wrap an in-memory upload.
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes { name: name.into(), data: data.into() }
    }

    /// Display name used in chunk metadata, logs and errors.
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }

    async fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                RagError::ExtractionError { source_name: self.name(), message: e.to_string() }
            }),
            Self::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

impl From<PathBuf> for PdfSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for PdfSource {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// What to do when one source in a batch cannot be extracted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Abort the whole batch on the first bad source.
    #[default]
    FailFast,
    /// Log and skip bad sources, returning what could be read.
    SkipInvalid,
}

/// Extracts page text from PDF sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor {
    policy: ExtractionPolicy,
}

impl PdfExtractor {
    /// Create a fail-fast extractor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure policy for multi-source batches.
    pub fn with_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Extract one source into a [`Document`] with pages in page order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] if the source cannot be read or is not a PDF.
    pub async fn extract(&self, source: &PdfSource) -> Result<Document> {
        let name = source.name();
        let bytes = source.read().await?;

        let pages = tokio::task::spawn_blocking({
            let name = name.clone();
            move || decode_pages(&name, &bytes)
        })
        .await
        .map_err(|e| RagError::ExtractionError {
            source_name: name.clone(),
            message: format!("extraction task failed: {e}"),
        })??;

        debug!(source = %name, page_count = pages.len(), "extracted pdf");
        Ok(Document { source: name, pages })
    }

    /// Extract every source in input order, applying the configured policy.
    ///
    /// # Errors
    ///
    /// With [`ExtractionPolicy::FailFast`], returns the first [`RagError::ExtractionError`].
    pub async fn extract_all(&self, sources: &[PdfSource]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(sources.len());
        for source in sources {
            match self.extract(source).await {
                Ok(document) => documents.push(document),
                Err(e) if self.policy == ExtractionPolicy::SkipInvalid => {
                    warn!(source = %source.name(), error = %e, "skipping unreadable pdf");
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            document_count = documents.len(),
            skipped = sources.len() - documents.len(),
            "extraction completed"
        );
        Ok(documents)
    }

    /// Extract every source and concatenate all text, sources in input order and pages
    /// in page order.
    ///
    /// # Errors
    ///
    /// See [`extract_all`](Self::extract_all).
    pub async fn extract_text(&self, sources: &[PdfSource]) -> Result<String> {
        let documents = self.extract_all(sources).await?;
        Ok(documents.iter().map(Document::text).collect())
    }
}

/// Load a PDF from memory and decode the text of each page.
fn decode_pages(name: &str, bytes: &[u8]) -> Result<Vec<Page>> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| RagError::ExtractionError {
        source_name: name.to_string(),
        message: format!("not a readable pdf: {e}"),
    })?;

    if doc.is_encrypted() {
        return Err(RagError::ExtractionError {
            source_name: name.to_string(),
            message: "pdf is encrypted".to_string(),
        });
    }

    // get_pages is a BTreeMap keyed by page number, so iteration is in page order.
    let pages = doc
        .get_pages()
        .into_keys()
        .map(|number| {
            let text = doc.extract_text(&[number]).unwrap_or_else(|e| {
                debug!(source = name, page = number, error = %e, "page has no decodable text");
                String::new()
            });
            Page { number, text }
        })
        .collect();

    Ok(pages)
}
