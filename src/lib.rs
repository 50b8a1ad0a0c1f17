//! # ThreatScope
//!
//! A local retrieval-augmented assistant for cybersecurity threat analysis.
//!
//! ThreatScope indexes a directory of plain-text threat reports into a
//! file-backed vector index, classifies incoming questions or log excerpts
//! into an analysis mode (Incident Response, Threat Intel, or Hybrid),
//! retrieves related report passages, and asks a local language model for
//! structured JSON findings: events, indicators of compromise, MITRE ATT&CK
//! mappings, severity, and a summary.
//!
//! ## Architecture
//!
//! ```text
//! build:  reports/*.txt ──▶ chunk (800/200) ──▶ embed ──▶ SQLite index
//!
//! query:  input ──▶ detect mode ──▶ retrieve top-k ──▶ compose prompt
//!                                                          │
//!               Analysis::Json / Analysis::Raw ◀── parse ◀── generate
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! threatscope build                                   # index data/threat_reports
//! threatscope query "What tools does APT29 use?"
//! threatscope analyze auth.log --mode ir --summary
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Corpus loading |
//! | [`chunk`] | Sliding-window chunking |
//! | [`embedding`] | Embedding client abstraction |
//! | [`index`] | Vector index storage and similarity search |
//! | [`ingest`] | Index build pipeline |
//! | [`mode`] | Analysis modes and keyword detection |
//! | [`prompt`] | Prompt templates and assembly |
//! | [`generation`] | Generation client abstraction |
//! | [`response`] | JSON extraction from model output |
//! | [`engine`] | Query orchestration |
//! | [`extract`] | Text extraction from submitted files |
//! | [`dashboard`] | Summary metrics over results |

pub mod chunk;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod mode;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod response;

pub use engine::ThreatRag;
pub use error::RagError;
pub use mode::{detect_mode, Mode};
pub use response::{parse_response, Analysis};
