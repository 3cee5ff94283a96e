//! Sentence-aware overlapping text chunking
//!
//! Splits cleaned document text into overlapping segments sized for
//! retrieval. Boundaries prefer to land just after a sentence-ending
//! period found within a bounded backward search window; the scan is
//! guaranteed to advance at least one character per iteration so no input
//! can stall it.

pub use crate::config::ChunkConfig;

/// Split text into overlapping chunks.
///
/// All positions are character offsets, never bytes, so multi-byte input is
/// safe. For each chunk the tentative end is `start + chunk_size`; when that
/// end falls strictly before the end of the text, the last period within the
/// final `min(200, chunk_size / 5)` characters moves the cut to just after
/// it. Chunks are trimmed and empty ones dropped. The next start is
/// `max(start + 1, end - chunk_overlap)`.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let text_length = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text_length {
        let tentative_end = start + config.chunk_size;

        let end = if tentative_end < text_length {
            // Look for a sentence ending within the trailing window
            let look_back = 200.min(config.chunk_size / 5);
            let window_start = tentative_end.saturating_sub(look_back).max(start);
            match chars[window_start..tentative_end]
                .iter()
                .rposition(|&c| c == '.')
            {
                Some(offset) => window_start + offset + 1,
                None => tentative_end,
            }
        } else {
            tentative_end
        };

        let slice_end = end.min(text_length);
        let chunk: String = chars[start..slice_end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        // Overlap the next chunk, but always advance at least one character
        start = (start + 1).max(end.saturating_sub(config.chunk_overlap));
    }

    chunks
}
