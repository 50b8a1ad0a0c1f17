//! Error taxonomy for the analysis engine.
//!
//! Precondition failures ([`RagError::NoDocuments`], [`RagError::IndexNotFound`])
//! are raised before any external call is made. Failures of the embedding or
//! generation backends surface as [`RagError::ServiceUnavailable`] or
//! [`RagError::GenerationTimedOut`] and are never retried.
//!
//! A model answer that contains no JSON is not an error at all; see
//! [`crate::response::Analysis::Raw`].

use std::path::PathBuf;

use thiserror::Error;

/// Which external backend a [`RagError::ServiceUnavailable`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Generation,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Embedding => write!(f, "embedding"),
            Service::Generation => write!(f, "generation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    /// The corpus directory is missing or holds no eligible documents.
    #[error("no documents found in corpus: {}", root.display())]
    NoDocuments { root: PathBuf },

    /// No index has been built at the configured location.
    #[error("index not found at {}; run `threatscope build` first", path.display())]
    IndexNotFound { path: PathBuf },

    /// An external model backend is unreachable or returned an error.
    #[error("{service} service unavailable: {message}")]
    ServiceUnavailable { service: Service, message: String },

    /// The generation backend did not answer within the configured bound.
    #[error("generation timed out after {secs}s")]
    GenerationTimedOut { secs: u64 },

    #[error("index storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("text extraction failed: {0}")]
    Extract(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub fn embedding(message: impl Into<String>) -> Self {
        RagError::ServiceUnavailable {
            service: Service::Embedding,
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        RagError::ServiceUnavailable {
            service: Service::Generation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_not_found_mentions_build() {
        let err = RagError::IndexNotFound {
            path: PathBuf::from("vectorstore/index.sqlite"),
        };
        let msg = err.to_string();
        assert!(msg.contains("vectorstore/index.sqlite"));
        assert!(msg.contains("build"));
    }

    #[test]
    fn test_service_display() {
        let err = RagError::embedding("connection refused");
        assert_eq!(
            err.to_string(),
            "embedding service unavailable: connection refused"
        );
        let err = RagError::generation("HTTP 500");
        assert!(err.to_string().starts_with("generation service"));
    }
}
