//! Boundary-aware overlapping text chunker.
//!
//! Splits extracted document text into windows of at most `size` characters,
//! preferring to cut at sentence or paragraph boundaries, with `overlap`
//! characters of shared context between adjacent chunks.

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Sentence/paragraph boundaries searched for before cutting a window.
const BOUNDARIES: [[char; 2]; 3] = [['.', ' '], ['.', '\n'], ['\n', '\n']];

/// Split `text` into overlapping chunks.
///
/// Inputs no longer than `size` come back as a single chunk, unchanged —
/// including the empty string.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    chunk_ranges(&chars, size, overlap)
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect()
}

/// Async variant used by bulk ingestion: identical output, but yields back
/// to the runtime while materializing chunks so long documents don't starve
/// the session.
pub async fn chunk_text_yielding(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    let ranges = chunk_ranges(&chars, size, overlap);
    let mut chunks = Vec::with_capacity(ranges.len());
    for (idx, (start, end)) in ranges.into_iter().enumerate() {
        chunks.push(chars[start..end].iter().collect());
        if idx % 32 == 31 {
            tokio::task::yield_now().await;
        }
    }
    chunks
}

/// Compute `[start, end)` character ranges for each chunk.
///
/// Invariants: the first range starts at 0, the last ends at `chars.len()`,
/// and every range starts at or before the previous range's end, so the
/// ranges jointly cover the input.
fn chunk_ranges(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let size = size.max(1);
    let total = chars.len();
    let mut ranges = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = (start + size).min(total);
        if end < total {
            if let Some(cut) = boundary_cut(chars, start, end) {
                end = cut;
            }
        }

        ranges.push((start, end));
        if end >= total {
            break;
        }

        // Guard against overlap >= chunk width stalling the scan.
        let next = end.saturating_sub(overlap).max(start + 1);
        if total - next < size / 2 {
            ranges.push((next, total));
            break;
        }
        start = next;
    }

    ranges
}

/// Search backward from the window end for the nearest boundary; the cut
/// keeps the delimiter with the leading chunk. Returns `None` when no
/// boundary exists in the window (hard cut at `size`).
fn boundary_cut(chars: &[char], start: usize, end: usize) -> Option<usize> {
    if end < 2 {
        return None;
    }
    let mut pos = end - 2;
    loop {
        let pair = [chars[pos], chars[pos + 1]];
        if BOUNDARIES.contains(&pair) {
            let cut = pos + 2;
            if cut > start {
                return Some(cut);
            }
        }
        if pos == start {
            return None;
        }
        pos -= 1;
    }
}
