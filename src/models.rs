//! Core data models used throughout ThreatScope.
//!
//! These types represent the reports, chunks, and retrieval hits that flow
//! through the index build and query pipeline.

use serde::Serialize;

/// A threat report loaded from the corpus.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path of the file relative to the corpus root.
    pub source_identifier: String,
    pub text: String,
}

/// A fixed-size window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source_identifier: String,
    pub chunk_index: i64,
    /// Char offset of the first character of the window.
    pub start: usize,
    /// Char offset one past the last character of the window.
    pub end: usize,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub source_identifier: String,
    pub chunk_index: i64,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub score: f32,
}
