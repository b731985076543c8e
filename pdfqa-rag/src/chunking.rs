//! Text chunking.
//!
//! [`RecursiveCharacterSplitter`] cuts text at the most natural boundary available:
//! paragraph breaks, then line breaks, then sentence punctuation, then spaces, then raw
//! characters. Fragments are merged back into chunks of at most `chunk_size` characters,
//! and each new chunk starts with up to `chunk_overlap` characters of trailing fragments
//! from the previous one.
//!
//! Sizes are counted in characters, not bytes. Every chunk is a trimmed slice of the input,
//! so chunks can be reported as byte spans into the original text.

use std::collections::VecDeque;
use std::ops::Range;

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// Separators tried in order, from the most to the least natural boundary.
/// The empty separator splits into single characters.
pub const DEFAULT_SEPARATORS: [&str; 7] = ["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// A strategy for splitting text into chunks.
pub trait Chunker: Send + Sync {
    /// Split text into trimmed, non-empty chunks, returned as byte ranges into `text`.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only input.
    fn split_spans(&self, text: &str) -> Vec<Range<usize>>;

    /// Split text into chunk strings.
    fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text).into_iter().map(|span| text[span].to_string()).collect()
    }

    /// Split a document, tagging each chunk with the document source and the page its
    /// first character came from.
    fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let text = document.text();

        // Byte offset at which each page starts inside `text`.
        let mut page_starts = Vec::with_capacity(document.pages.len());
        let mut offset = 0;
        for page in &document.pages {
            page_starts.push((offset, page.number));
            offset += page.text.len();
        }

        self.split_spans(&text)
            .into_iter()
            .map(|span| {
                let page = page_starts
                    .iter()
                    .take_while(|(start, _)| *start <= span.start)
                    .last()
                    .map(|(_, number)| *number);
                let chunk = Chunk::new(&text[span]).with_source(&document.source);
                match page {
                    Some(number) => chunk.with_page(number),
                    None => chunk,
                }
            })
            .collect()
    }
}

/// Recursive, separator-aware character splitter.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{Chunker, RecursiveCharacterSplitter};
///
/// let splitter = RecursiveCharacterSplitter::new(5000, 1000)?;
/// let chunks = splitter.split_text(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter with the default separator list.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list. An empty separator is always appended as the last
    /// resort so that chunk sizes stay bounded.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut separators: Vec<String> = separators.into_iter().map(Into::into).collect();
        if separators.last().is_none_or(|s| !s.is_empty()) {
            separators.push(String::new());
        }
        self.separators = separators;
        self
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` (located at byte `base` of the original) into fragments that each fit
    /// in a chunk, then merge them. Returns untrimmed spans.
    fn split_recursive(&self, text: &str, base: usize, separators: &[String]) -> Vec<Range<usize>> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let mut fragments = Vec::new();
        let mut merged = Vec::new();

        for (start, piece) in split_with_offsets(text, base, separator) {
            let len = piece.chars().count();
            if len <= self.chunk_size {
                fragments.push((start, len, start + piece.len()));
                continue;
            }
            if !fragments.is_empty() {
                merged.extend(self.merge(&fragments));
                fragments.clear();
            }
            if remaining.is_empty() {
                merged.push(start..start + piece.len());
            } else {
                merged.extend(self.split_recursive(piece, start, remaining));
            }
        }

        if !fragments.is_empty() {
            merged.extend(self.merge(&fragments));
        }

        merged
    }

    /// Merge consecutive `(start, char_len, end)` fragments into spans of at most
    /// `chunk_size` characters, carrying up to `chunk_overlap` characters forward.
    fn merge(&self, fragments: &[(usize, usize, usize)]) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut window: VecDeque<(usize, usize, usize)> = VecDeque::new();
        let mut total = 0;

        for &fragment in fragments {
            let (_, len, _) = fragment;
            if total + len > self.chunk_size && !window.is_empty() {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    spans.push(first.0..last.2);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, popped, _)) => total -= popped,
                        None => break,
                    }
                }
            }
            window.push_back(fragment);
            total += len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            spans.push(first.0..last.2);
        }

        spans
    }
}

impl Chunker for RecursiveCharacterSplitter {
    fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let spans = if text.chars().count() <= self.chunk_size {
            vec![0..text.len()]
        } else {
            self.split_recursive(text, 0, &self.separators)
        };

        let mut trimmed: Vec<Range<usize>> = Vec::with_capacity(spans.len());
        for span in spans {
            let Some(span) = trim_span(text, span) else { continue };
            // Merging can re-emit an identical span when a window is carried over intact.
            if trimmed.last() != Some(&span) {
                trimmed.push(span);
            }
        }
        trimmed
    }
}

/// Split `text` after each occurrence of `separator` (keeping it on the preceding piece),
/// or into characters when the separator is empty. Offsets are relative to `base`.
fn split_with_offsets<'a>(text: &'a str, base: usize, separator: &str) -> Vec<(usize, &'a str)> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| (base + i, &text[i..i + c.len_utf8()])).collect();
    }

    let mut offset = base;
    text.split_inclusive(separator)
        .map(|piece| {
            let start = offset;
            offset += piece.len();
            (start, piece)
        })
        .collect()
}

/// Shrink a span to exclude surrounding whitespace; `None` if nothing is left.
fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return None;
    }
    Some(span.start + leading..span.end - trailing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = RecursiveCharacterSplitter::new(30, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn falls_back_to_characters_for_long_words() {
        let splitter = RecursiveCharacterSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn carries_overlap_into_next_chunk() {
        let splitter = RecursiveCharacterSplitter::new(11, 6).unwrap();
        let chunks = splitter.split_text("one two three four");
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].starts_with("two"));
        assert!(chunks[2].starts_with("three"));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let splitter = RecursiveCharacterSplitter::new(3, 0).unwrap();
        let chunks = splitter.split_text("ééééé");
        assert_eq!(chunks, vec!["ééé", "éé"]);
    }

    #[test]
    fn chunk_document_tags_source_and_page() {
        let splitter = RecursiveCharacterSplitter::new(20, 0).unwrap();
        let document = Document {
            source: "guide.pdf".into(),
            pages: vec![
                Page { number: 1, text: "Page one text.\n".into() },
                Page { number: 2, text: "Page two text.\n".into() },
            ],
        };
        let chunks = splitter.chunk_document(&document);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].page, Some(2));
        assert_eq!(chunks[1].source.as_deref(), Some("guide.pdf"));
    }

    #[test]
    fn custom_separators_keep_character_fallback() {
        let splitter = RecursiveCharacterSplitter::new(5, 0).unwrap().with_separators(["|"]);
        assert_eq!(splitter.separators.last().map(String::as_str), Some(""));
        assert_eq!(splitter.split_text("ab|cdefgh"), vec!["ab|", "cdefg", "h"]);
    }
}
