//! Plain-text extraction for files submitted for analysis.
//!
//! Supports `.txt` and `.log` (decoded as UTF-8, invalid bytes replaced) and
//! `.pdf` (text layer via `pdf-extract`). Anything else is rejected.

use std::path::Path;

use crate::error::{RagError, Result};

/// Supported input kinds, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Pdf,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "log" => Ok(InputKind::Text),
            "pdf" => Ok(InputKind::Pdf),
            "" => Err(RagError::Extract(format!(
                "cannot tell file type of {} (expected .txt, .log or .pdf)",
                path.display()
            ))),
            other => Err(RagError::Extract(format!(
                "unsupported file type '.{}' (expected .txt, .log or .pdf)",
                other
            ))),
        }
    }
}

/// Read a file and return its text content.
pub fn extract_file(path: &Path) -> Result<String> {
    let kind = InputKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let text = extract_text(&bytes, kind)?;

    if text.trim().is_empty() {
        return Err(RagError::Extract(format!(
            "no text could be extracted from {}",
            path.display()
        )));
    }

    Ok(text)
}

/// Extract text from in-memory content of the given kind.
pub fn extract_text(bytes: &[u8], kind: InputKind) -> Result<String> {
    match kind {
        InputKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        InputKind::Pdf => extract_pdf(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extract(format!("PDF extraction failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(InputKind::from_path(Path::new("auth.LOG")).unwrap(), InputKind::Text);
        assert_eq!(InputKind::from_path(Path::new("r.txt")).unwrap(), InputKind::Text);
        assert_eq!(InputKind::from_path(Path::new("r.pdf")).unwrap(), InputKind::Pdf);
        assert!(InputKind::from_path(Path::new("r.docx")).is_err());
        assert!(InputKind::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_log_file_lossy() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("auth.log");
        fs::write(&path, b"Failed password for root \xff from 10.0.0.9").unwrap();
        let text = extract_file(&path).unwrap();
        assert!(text.starts_with("Failed password for root"));
        assert!(text.ends_with("from 10.0.0.9"));
    }

    #[test]
    fn test_empty_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.txt");
        fs::write(&path, "  \n").unwrap();
        assert!(matches!(extract_file(&path), Err(RagError::Extract(_))));
    }

    #[test]
    fn test_invalid_pdf_is_extract_error() {
        let err = extract_text(b"not a pdf", InputKind::Pdf).unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }
}
