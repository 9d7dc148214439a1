mod extractor;

pub use extractor::{extract_pages, extract_pages_from_bytes, normalize_page_text};
