use std::path::Path;

use anyhow::{Context, Result};

use crate::document::{ExtractedDocument, Page};

/// Extract page-level text from a PDF file
pub fn extract_pages(path: &Path) -> Result<ExtractedDocument> {
    let pdf_bytes = std::fs::read(path).context("Failed to read PDF file")?;
    extract_pages_from_bytes(&pdf_bytes)
}

/// Extract page-level text from PDF bytes already in memory
pub fn extract_pages_from_bytes(pdf_bytes: &[u8]) -> Result<ExtractedDocument> {
    let doc = lopdf::Document::load_mem(pdf_bytes).context("Failed to parse PDF")?;

    let mut page_numbers: Vec<u32> = doc.get_pages().keys().cloned().collect();
    page_numbers.sort();

    let mut pages = Vec::with_capacity(page_numbers.len());
    for (i, page_num) in page_numbers.iter().enumerate() {
        // A page whose content stream cannot be decoded still counts as a page
        let raw = match doc.extract_text(&[*page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "Failed to extract page text");
                String::new()
            }
        };
        pages.push(Page::new(i + 1, normalize_page_text(&raw)));
    }

    let document = ExtractedDocument::from_pages(pages);

    tracing::debug!(
        pages = document.total_pages,
        words = document.total_words,
        chars = document.full_text.len(),
        "Extracted PDF text"
    );

    Ok(document)
}

/// Collapse every whitespace run into one space and trim the ends.
pub fn normalize_page_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// PDF bytes with one Helvetica text line per page.
    fn notice_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let kids: Vec<Object> = page_texts
            .iter()
            .map(|text| {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 11.into()]),
                        Operation::new("Td", vec![72.into(), 720.into()]),
                        Operation::new("Tj", vec![Object::string_literal(*text)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                let stream = Stream::new(dictionary! {}, content.encode().unwrap());
                let content_id = doc.add_object(stream);
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                    "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                })
                .into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extract_pages_numbers_and_words() {
        let pdf_bytes = notice_pdf(&["Edital de Pregao", "Dos Itens", "Anexo I"]);

        let doc = extract_pages_from_bytes(&pdf_bytes).unwrap();

        assert_eq!(doc.total_pages, 3);
        let numbers: Vec<usize> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(
            doc.pages[0].text.contains("Edital") || doc.pages[0].text.contains("Pregao"),
            "unexpected page text: '{}'",
            doc.pages[0].text
        );
        assert!(doc.total_words > 0);
    }

    #[test]
    fn test_extract_pages_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pdf_path = temp_dir.path().join("edital.pdf");
        std::fs::write(&pdf_path, notice_pdf(&["Objeto"])).unwrap();

        let doc = extract_pages(&pdf_path).unwrap();

        assert_eq!(doc.total_pages, 1);
    }

    #[test]
    fn test_extract_pages_file_not_found() {
        let err = extract_pages(Path::new("/nonexistent/path/to/edital.pdf")).unwrap_err();
        assert!(
            err.to_string().contains("Failed to read PDF file"),
            "Expected 'Failed to read PDF file' error, got: {}",
            err
        );
    }

    #[test]
    fn test_extract_pages_invalid_pdf() {
        let err = extract_pages_from_bytes(b"this is not a valid pdf file").unwrap_err();
        assert!(err.to_string().contains("Failed to parse PDF"));
    }

    #[test]
    fn test_normalize_page_text() {
        assert_eq!(
            normalize_page_text("  DOS\tITENS \n\n Lote  1 "),
            "DOS ITENS Lote 1"
        );
        assert_eq!(normalize_page_text(" \n "), "");
    }
}
