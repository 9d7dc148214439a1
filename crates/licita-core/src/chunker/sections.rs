use std::sync::OnceLock;

use regex::Regex;

use super::{CharIndex, Chunk, SectionKind};
use crate::config::ChunkingConfig;
use crate::document::{prefix_chars, Page};

/// Only the top of a page is checked for a heading.
pub const HEADING_SCAN_CHARS: usize = 2_000;

/// Ordered heading patterns. Item-table headings come first: an items page
/// usually repeats the word "objeto", and must not be taken for a header.
const SECTION_PATTERNS: [(SectionKind, &str); 8] = [
    (
        SectionKind::Items,
        r"(?i)\b(DOS ITENS|ITENS DO CERTAME|RELAÇÃO DE ITENS|ITENS DA LICITAÇÃO|LISTA DE ITENS)\b",
    ),
    (SectionKind::Items, r"(?i)\b(LOTE\s*(?:N\s*[º°o.]?|º)?\s*\d+|GRUPO\s*\d+)\b"),
    (
        SectionKind::Items,
        r"(?i)\b(TABELA DE PREÇOS|PLANILHA DE PREÇOS|QUANTITATIVO|CRONOGRAMA FÍSICO)\b",
    ),
    (
        SectionKind::Header,
        r"(?i)\b(OBJETO|DO OBJETO|OBJETO DA LICITAÇÃO)\b",
    ),
    (
        SectionKind::Eligibility,
        r"(?i)\b(DA HABILITAÇÃO|HABILITAÇÃO|DOCUMENTOS DE HABILITAÇÃO|QUALIFICAÇÃO TÉCNICA)\b",
    ),
    (
        SectionKind::Terms,
        r"(?i)\b(DAS CONDIÇÕES|CONDIÇÕES DE PAGAMENTO|DO PAGAMENTO|PRAZO DE ENTREGA|LOCAL DE ENTREGA)\b",
    ),
    (
        SectionKind::Penalties,
        r"(?i)\b(DAS PENALIDADES|PENALIDADES|SANÇÕES|MULTAS)\b",
    ),
    (
        SectionKind::Attachments,
        r"(?i)\b(ANEXO\s+[IVX\d]+|MODELO DE PROPOSTA)\b",
    ),
];

fn patterns() -> &'static [(SectionKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(SectionKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SECTION_PATTERNS
            .iter()
            .map(|(kind, pattern)| {
                let regex = Regex::new(pattern).expect("section heading pattern is valid");
                (*kind, regex)
            })
            .collect()
    })
}

/// Section whose heading appears first in pattern order within the leading
/// text of a page, if any.
pub fn detect_section(page_text: &str) -> Option<SectionKind> {
    let leading = prefix_chars(page_text, HEADING_SCAN_CHARS);
    patterns()
        .iter()
        .find(|(_, regex)| regex.is_match(leading))
        .map(|(kind, _)| *kind)
}

/// Group pages by detected section and split every group to the size limit.
///
/// Pages without a recognizable heading stay in the current section, which
/// starts as [`SectionKind::Header`]. A group that grows past 1.5x the limit
/// without a section change is flushed early, keeping its last page as
/// context for the next group.
pub fn chunk_by_section(pages: &[Page], config: &ChunkingConfig) -> Vec<Chunk> {
    let flush_threshold = config.max_chunk_chars * 3 / 2;
    let mut acc = Accumulator::new(config);

    for page in pages {
        match detect_section(&page.text) {
            Some(detected) if detected != acc.section => {
                acc.flush();
                acc.start(detected, page);
            }
            _ => {
                acc.push(page);
                if acc.char_total() > flush_threshold {
                    acc.flush();
                    acc.keep_last_as_seed();
                }
            }
        }
    }
    acc.flush();

    tracing::debug!(
        pages = pages.len(),
        chunks = acc.chunks.len(),
        "Chunked document by section"
    );

    acc.chunks
}

/// Chunks accumulated under one section.
pub fn chunks_in_section(chunks: &[Chunk], section: SectionKind) -> Vec<&Chunk> {
    chunks.iter().filter(|c| c.section == section).collect()
}

struct Accumulator<'p> {
    max_chars: usize,
    overlap_chars: usize,
    section: SectionKind,
    pages: Vec<&'p Page>,
    /// Pages not yet emitted in any chunk
    fresh: usize,
    chunks: Vec<Chunk>,
}

impl<'p> Accumulator<'p> {
    fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_chars: config.max_chunk_chars,
            overlap_chars: config.overlap_chars,
            section: SectionKind::Header,
            pages: Vec::new(),
            fresh: 0,
            chunks: Vec::new(),
        }
    }

    fn start(&mut self, section: SectionKind, page: &'p Page) {
        self.section = section;
        self.pages = vec![page];
        self.fresh = 1;
    }

    fn push(&mut self, page: &'p Page) {
        self.pages.push(page);
        self.fresh += 1;
    }

    fn keep_last_as_seed(&mut self) {
        if let Some(last) = self.pages.pop() {
            self.pages = vec![last];
        }
        self.fresh = 0;
    }

    fn char_total(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    fn flush(&mut self) {
        // A lone seed page was already emitted by the previous flush
        if self.fresh == 0 || self.pages.is_empty() {
            return;
        }

        let joined = self
            .pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        // Char offset where each page ends inside `joined`
        let mut page_ends = Vec::with_capacity(self.pages.len());
        let mut offset = 0;
        for (i, page) in self.pages.iter().enumerate() {
            offset += page.text.chars().count();
            if i + 1 < self.pages.len() {
                offset += 1;
            }
            page_ends.push(offset);
        }

        let index = CharIndex::new(&joined);
        for (start, end) in split_ranges(&index, self.max_chars, self.overlap_chars) {
            let text = index.slice(start, end);
            if text.trim().is_empty() {
                continue;
            }
            let first = char_offset_to_page(start, &page_ends);
            let last = char_offset_to_page(end.saturating_sub(1).max(start), &page_ends);
            self.chunks.push(Chunk {
                index: self.chunks.len(),
                section: self.section,
                text: text.to_string(),
                page_start: self.pages[first].page_number,
                page_end: self.pages[last].page_number,
            });
        }

        self.fresh = 0;
    }
}

/// Given a char offset in the joined text, find which accumulated page it
/// falls on (0-based position in the accumulation).
fn char_offset_to_page(offset: usize, page_ends: &[usize]) -> usize {
    page_ends
        .iter()
        .position(|&end| offset < end)
        .unwrap_or(page_ends.len().saturating_sub(1))
}

/// Char ranges of at most `max_chars`, preferring to end at the last newline
/// past the middle of the window, each starting `overlap` chars before the
/// previous end.
fn split_ranges(index: &CharIndex<'_>, max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = index.len();
    if len <= max_chars || max_chars == 0 {
        return vec![(0, len)];
    }

    let min_break = max_chars / 2;
    let mut ranges = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = start + max_chars;
        if hard_end >= len {
            ranges.push((start, len));
            break;
        }

        let end = match index.last_newline(start, hard_end) {
            Some(newline) if newline > start + min_break => newline,
            _ => hard_end,
        };
        ranges.push((start, end));
        start = end.saturating_sub(overlap).max(start + 1);
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_chars: 200,
            overlap_chars: 20,
            item_window_chars: 400,
            item_overlap_chars: 40,
        }
    }

    fn filler(words: usize) -> String {
        vec!["texto"; words].join(" ")
    }

    #[test]
    fn test_pages_without_headings_form_one_header_chunk() {
        let pages = vec![
            Page::new(1, "Prefeitura municipal de exemplo"),
            Page::new(2, "Texto corrido sem titulos"),
            Page::new(3, "Mais texto corrido"),
        ];

        let chunks = chunk_by_section(&pages, &ChunkingConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, SectionKind::Header);
        assert_eq!((chunks[0].page_start, chunks[0].page_end), (1, 3));
        for page in &pages {
            assert!(chunks[0].text.contains(&page.text));
        }
    }

    #[test]
    fn test_item_heading_wins_over_object() {
        let text = "DO OBJETO: aquisição de mobiliário. DOS ITENS: cadeiras e mesas";
        assert_eq!(detect_section(text), Some(SectionKind::Items));
        assert_eq!(detect_section("LOTE Nº 3 - cadeiras"), Some(SectionKind::Items));
        assert_eq!(detect_section("Do objeto da licitação"), Some(SectionKind::Header));
        assert_eq!(
            detect_section("11. DA HABILITAÇÃO"),
            Some(SectionKind::Eligibility)
        );
        assert_eq!(
            detect_section("condições de pagamento"),
            Some(SectionKind::Terms)
        );
        assert_eq!(detect_section("DAS SANÇÕES"), Some(SectionKind::Penalties));
        assert_eq!(
            detect_section("ANEXO II - MODELO"),
            Some(SectionKind::Attachments)
        );
        assert_eq!(detect_section("texto comum"), None);
    }

    #[test]
    fn test_lot_headings_in_printed_forms() {
        for heading in ["Lote nº 01", "LOTE Nº 3", "LOTE 2", "LOTE N. 4", "lote n° 5", "GRUPO 7"] {
            assert_eq!(
                detect_section(&format!("{heading} - cadeiras")),
                Some(SectionKind::Items),
                "{heading}"
            );
        }
        assert_eq!(detect_section("loteamento urbano"), None);
    }

    #[test]
    fn test_heading_beyond_leading_text_is_ignored() {
        let text = format!("{} DOS ITENS", "a".repeat(HEADING_SCAN_CHARS));
        assert_eq!(detect_section(&text), None);
    }

    #[test]
    fn test_section_change_starts_new_chunk() {
        let pages = vec![
            Page::new(1, "Edital. DO OBJETO: mobiliário escolar"),
            Page::new(2, "continuação do preâmbulo"),
            Page::new(3, "DOS ITENS: item 1 cadeira"),
            Page::new(4, "item 2 mesa"),
            Page::new(5, "DA HABILITAÇÃO: certidões"),
        ];

        let chunks = chunk_by_section(&pages, &ChunkingConfig::default());

        let summary: Vec<_> = chunks
            .iter()
            .map(|c| (c.section, c.page_start, c.page_end))
            .collect();
        assert_eq!(
            summary,
            vec![
                (SectionKind::Header, 1, 2),
                (SectionKind::Items, 3, 4),
                (SectionKind::Eligibility, 5, 5),
            ]
        );
        let indexes: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_oversized_section_is_split_with_overlap() {
        let lines: Vec<String> = (0..40).map(|i| format!("linha {i:02} da tabela")).collect();
        let pages = vec![Page::new(1, lines.join("\n"))];
        let config = small_config();

        let chunks = chunk_by_section(&pages, &config);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.char_count() <= config.max_chunk_chars);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].char_count() - config.overlap_chars)
                .collect();
            assert!(pair[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn test_sub_chunks_report_their_own_pages() {
        let pages: Vec<Page> = (1..=6).map(|n| Page::new(n, filler(12))).collect();
        let config = ChunkingConfig {
            max_chunk_chars: 150,
            overlap_chars: 10,
            ..small_config()
        };

        let chunks = chunk_by_section(&pages, &config);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].page_start, 1);
        assert!(chunks[0].page_end < 6);
        assert!(chunks.last().unwrap().page_end >= chunks[0].page_end);
    }

    #[test]
    fn test_long_run_forces_flush_with_seed_page() {
        // 90 chars per page, threshold 1.5 * 200 = 300
        let pages: Vec<Page> = (1..=8)
            .map(|n| Page::new(n, format!("{:02}{}", n, "x".repeat(88))))
            .collect();
        let config = small_config();

        let chunks = chunk_by_section(&pages, &config);

        assert!(chunks.len() >= 2);
        // Every page is emitted
        for page in &pages {
            assert!(
                chunks.iter().any(|c| c.text.contains(&page.text)),
                "page {} missing",
                page.page_number
            );
        }
        // The seed page (last page of the first group) opens the second group
        let seed = &pages[3].text;
        let holders = chunks.iter().filter(|c| c.text.contains(seed.as_str())).count();
        assert!(holders >= 2, "seed page carried into {holders} chunks");
    }

    #[test]
    fn test_seed_page_alone_is_not_reemitted() {
        // Forced flush right before a section change leaves only the seed
        let pages = vec![
            Page::new(1, "a".repeat(180)),
            Page::new(2, "b".repeat(180)),
            Page::new(3, "DOS ITENS cadeira"),
        ];

        let chunks = chunk_by_section(&pages, &small_config());

        let headers = chunks_in_section(&chunks, SectionKind::Header);
        assert_eq!(headers.len(), 3);
        assert!(!chunks.iter().any(|c| c.text == "b".repeat(180)));
        assert_eq!(chunks.last().unwrap().section, SectionKind::Items);
    }

    #[test]
    fn test_chunks_in_section() {
        let pages = vec![
            Page::new(1, "DO OBJETO"),
            Page::new(2, "DOS ITENS"),
            Page::new(3, "DO OBJETO novamente"),
        ];
        let chunks = chunk_by_section(&pages, &ChunkingConfig::default());

        let headers = chunks_in_section(&chunks, SectionKind::Header);
        assert_eq!(headers.len(), 2);
        assert!(chunks_in_section(&chunks, SectionKind::Penalties).is_empty());
    }

    #[test]
    fn test_no_pages_no_chunks() {
        assert!(chunk_by_section(&[], &ChunkingConfig::default()).is_empty());
    }
}
