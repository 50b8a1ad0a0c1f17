//! Sliding-window text chunker.
//!
//! Splits a document into windows of `chunk_size` characters, each starting
//! `chunk_size - chunk_overlap` characters after the previous one. The last
//! window ends exactly at the end of the text, so concatenating the first
//! `step` characters of every window followed by the whole last window
//! reconstructs the source.
//!
//! Sizes are measured in Unicode scalar values, never bytes, so a window never
//! splits a multi-byte character.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

/// Split a document into overlapping windows.
///
/// An empty document produces no chunks. Callers guarantee
/// `chunk_overlap < chunk_size` (enforced by config validation).
pub fn chunk_document(doc: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let text = doc.text.as_str();

    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    if char_len == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::with_capacity(expected_chunk_count(char_len, chunk_size, chunk_overlap));
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let end = (start + chunk_size).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(
            &doc.source_identifier,
            chunk_index,
            start,
            end,
            piece,
        ));
        if end == char_len {
            break;
        }
        chunk_index += 1;
        start += step;
    }

    chunks
}

/// Number of windows [`chunk_document`] produces for a text of `char_len` chars.
///
/// `ceil((len - overlap) / (size - overlap))` for texts longer than one
/// window, one for shorter non-empty texts, zero for empty ones.
pub fn expected_chunk_count(char_len: usize, chunk_size: usize, chunk_overlap: usize) -> usize {
    if char_len == 0 {
        return 0;
    }
    if char_len <= chunk_size {
        return 1;
    }
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    (char_len - chunk_overlap).div_ceil(step)
}

fn make_chunk(source: &str, index: i64, start: usize, end: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        source_identifier: source.to_string(),
        chunk_index: index,
        start,
        end,
        text: text.to_string(),
        hash,
    }
}
