//! Page-level text of a notice, as handed to the pipeline.

use serde::{Deserialize, Serialize};

/// Text of one rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed page number
    pub page_number: usize,
    pub text: String,
    pub word_count: usize,
}

impl Page {
    /// Build a page, counting whitespace-separated words.
    pub fn new(page_number: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            page_number,
            text,
            word_count,
        }
    }
}

/// Separator placed between pages when building the full document text
pub const PAGE_SEPARATOR: &str = "\n\n";

/// A notice after text extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub pages: Vec<Page>,
    pub total_pages: usize,
    pub total_words: usize,
    /// Page texts joined with [`PAGE_SEPARATOR`]
    pub full_text: String,
}

impl ExtractedDocument {
    pub fn from_pages(pages: Vec<Page>) -> Self {
        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);
        let total_words = pages.iter().map(|p| p.word_count).sum();

        Self {
            total_pages: pages.len(),
            total_words,
            full_text,
            pages,
        }
    }

    /// True when there is no text worth sending to a model.
    pub fn is_blank(&self) -> bool {
        self.full_text.trim().is_empty()
    }

    /// First `max_chars` characters of the full text.
    pub fn leading_text(&self, max_chars: usize) -> &str {
        prefix_chars(&self.full_text, max_chars)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pages_joins_text() {
        let doc = ExtractedDocument::from_pages(vec![
            Page::new(1, "Pregão eletrônico 12/2025"),
            Page::new(2, "Do objeto"),
        ]);

        assert_eq!(doc.total_pages, 2);
        assert_eq!(doc.total_words, 5);
        assert_eq!(doc.full_text, "Pregão eletrônico 12/2025\n\nDo objeto");
    }

    #[test]
    fn test_blank_document() {
        let doc = ExtractedDocument::from_pages(vec![Page::new(1, "   "), Page::new(2, "")]);
        assert!(doc.is_blank());
    }

    #[test]
    fn test_prefix_chars_is_utf8_safe() {
        assert_eq!(prefix_chars("licitação", 8), "licitaçã");
        assert_eq!(prefix_chars("abc", 10), "abc");
        assert_eq!(prefix_chars("", 3), "");
    }
}
