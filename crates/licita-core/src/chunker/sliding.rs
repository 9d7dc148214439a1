use super::{CharIndex, SlidingChunk};

/// Split the full document text into overlapping windows covering all of it.
///
/// A window ends right after the last newline found beyond 60% of its length,
/// so table rows are not cut in half; without such a newline it is cut at
/// `window` characters. Consecutive windows share exactly `overlap`
/// characters. Blank text yields no windows.
pub fn chunk_full_text(text: &str, window: usize, overlap: usize) -> Vec<SlidingChunk> {
    if text.trim().is_empty() || window == 0 {
        return Vec::new();
    }

    let index = CharIndex::new(text);
    let len = index.len();
    let min_break = window * 3 / 5;

    let mut windows: Vec<&str> = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = start + window;
        if hard_end >= len {
            windows.push(index.slice(start, len));
            break;
        }

        let end = match index.last_newline(start, hard_end) {
            Some(newline) if newline > start + min_break => newline + 1,
            _ => hard_end,
        };
        windows.push(index.slice(start, end));

        // Validated configs always move forward; the max() only guards
        // against hand-built ones.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    let total = windows.len();
    windows
        .into_iter()
        .enumerate()
        .map(|(index, text)| SlidingChunk {
            text: text.to_string(),
            index,
            total,
        })
        .collect()
}
