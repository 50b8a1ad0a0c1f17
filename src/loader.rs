//! Corpus loader.
//!
//! Walks the configured corpus root and reads every file matching the include
//! globs (`**/*.txt` by default) into a [`Document`]. Documents are returned
//! sorted by their path relative to the root so that index builds are
//! deterministic.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{RagError, Result};
use crate::models::Document;

/// Load every eligible report under the corpus root.
///
/// Fails with [`RagError::NoDocuments`] when the root is missing or when no
/// file matches, so that a build never produces an empty index.
pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(RagError::NoDocuments { root: root.clone() });
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        docs.push(read_document(path, &rel_str)?);
    }

    if docs.is_empty() {
        return Err(RagError::NoDocuments { root: root.clone() });
    }

    docs.sort_by(|a, b| a.source_identifier.cmp(&b.source_identifier));
    tracing::debug!(count = docs.len(), root = %root.display(), "loaded corpus");

    Ok(docs)
}

fn read_document(path: &Path, relative_path: &str) -> Result<Document> {
    let bytes = std::fs::read(path)?;
    Ok(Document {
        source_identifier: relative_path.to_string(),
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn test_missing_root_is_no_documents() {
        let err = load_corpus(&corpus(Path::new("/nonexistent/reports"))).unwrap_err();
        assert!(matches!(err, RagError::NoDocuments { .. }));
    }

    #[test]
    fn test_empty_root_is_no_documents() {
        let tmp = TempDir::new().unwrap();
        let err = load_corpus(&corpus(tmp.path())).unwrap_err();
        assert!(matches!(err, RagError::NoDocuments { .. }));
    }

    #[test]
    fn test_only_txt_files_loaded_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "beta").unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("c.pdf"), "not text").unwrap();
        fs::create_dir_all(tmp.path().join("apt")).unwrap();
        fs::write(tmp.path().join("apt/apt29.txt"), "cozy bear").unwrap();

        let docs = load_corpus(&corpus(tmp.path())).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.source_identifier.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "apt/apt29.txt", "b.txt"]);
        assert_eq!(docs[0].text, "alpha");
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.txt"), "keep").unwrap();
        fs::write(tmp.path().join("draft.txt"), "skip").unwrap();
        let config = CorpusConfig {
            exclude_globs: vec!["draft.txt".to_string()],
            ..corpus(tmp.path())
        };
        let docs = load_corpus(&config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_identifier, "keep.txt");
    }
}
