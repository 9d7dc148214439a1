//! Partitioning of notice text into windows that fit one inference request.
//!
//! Two strategies live here:
//!
//! - [`chunk_by_section`] groups pages under the heading that introduced them
//!   (header, items, eligibility, ...) and splits oversized groups. Stages that
//!   only need one part of the notice pick their input from these chunks.
//! - [`chunk_full_text`] slides a fixed window over the whole text with a
//!   fixed overlap. Item extraction uses it so that coverage never depends on
//!   heading detection.
//!
//! All sizes are measured in characters, not bytes.

mod sections;
mod sliding;

pub use sections::{chunk_by_section, chunks_in_section, detect_section};
pub use sliding::chunk_full_text;

use serde::{Deserialize, Serialize};

/// Part of a notice a chunk was accumulated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Preamble, object, issuing body, dates
    Header,
    /// Item, lot and price tables
    Items,
    /// Qualification documents and certifications
    Eligibility,
    /// Payment, delivery and execution terms
    Terms,
    Penalties,
    /// Annexes and proposal templates
    Attachments,
    Other,
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Header => write!(f, "header"),
            SectionKind::Items => write!(f, "items"),
            SectionKind::Eligibility => write!(f, "eligibility"),
            SectionKind::Terms => write!(f, "terms"),
            SectionKind::Penalties => write!(f, "penalties"),
            SectionKind::Attachments => write!(f, "attachments"),
            SectionKind::Other => write!(f, "other"),
        }
    }
}

/// A bounded slice of pages tagged with the section it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub section: SectionKind,
    pub text: String,
    /// First page contributing text to this chunk (1-indexed)
    pub page_start: usize,
    /// Last page contributing text to this chunk (1-indexed)
    pub page_end: usize,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// One window of the exhaustive full-text scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingChunk {
    pub text: String,
    pub index: usize,
    /// Number of windows in the scan
    pub total: usize,
}

/// Byte offset of every character of a string, so that splitting can work in
/// character positions and still slice on valid UTF-8 boundaries.
pub(crate) struct CharIndex<'a> {
    text: &'a str,
    /// `offsets[i]` is the byte offset of char `i`; the last entry is `text.len()`
    offsets: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    /// Length in characters
    pub(crate) fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Char position of the last `'\n'` in `[start, end)`.
    pub(crate) fn last_newline(&self, start: usize, end: usize) -> Option<usize> {
        let byte_start = self.offsets[start];
        let found = self.slice(start, end).rfind('\n')?;
        let byte_pos = byte_start + found;
        self.offsets.binary_search(&byte_pos).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_index_multibyte() {
        let index = CharIndex::new("açã\nõx");
        assert_eq!(index.len(), 6);
        assert_eq!(index.slice(1, 3), "çã");
        assert_eq!(index.last_newline(0, 6), Some(3));
        assert_eq!(index.last_newline(0, 3), None);
        assert_eq!(index.last_newline(4, 6), None);
    }

    #[test]
    fn test_section_kind_display_matches_serde() {
        for kind in [
            SectionKind::Header,
            SectionKind::Items,
            SectionKind::Eligibility,
            SectionKind::Terms,
            SectionKind::Penalties,
            SectionKind::Attachments,
            SectionKind::Other,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
