//! Index build pipeline.
//!
//! Coordinates the full build: corpus loader → chunker → embedder → index.
//! Every embedding is computed before storage is touched, and the index is
//! then swapped in one transaction, so a failed build never damages the
//! previous index.

use chrono::Utc;
use uuid::Uuid;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::{EmbeddedChunk, IndexMeta, VectorIndex};
use crate::loader::load_corpus;
use crate::models::Chunk;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Document and chunk counts a build would produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildPlan {
    pub documents: usize,
    pub chunks: usize,
}

/// Load and chunk the corpus without embedding or writing anything.
pub fn plan_build(config: &Config) -> Result<BuildPlan> {
    let (documents, chunks) = load_and_chunk(config)?;
    Ok(BuildPlan {
        documents,
        chunks: chunks.len(),
    })
}

/// Rebuild the index at `config.index.path` from the corpus.
///
/// Fails with [`RagError::NoDocuments`] before any embedding call when the
/// corpus is missing, empty, or contains only empty files. Embedding failures
/// abort the build with the previous index left in place.
pub async fn build_index(
    config: &Config,
    embedder: &dyn Embedder,
    progress: &dyn BuildProgressReporter,
) -> Result<IndexMeta> {
    progress.report(BuildProgressEvent::Loading {
        root: config.corpus.root.display().to_string(),
    });

    let (documents, chunks) = load_and_chunk(config)?;
    let total = chunks.len() as u64;

    progress.report(BuildProgressEvent::Chunked {
        documents: documents as u64,
        chunks: total,
    });
    tracing::info!(documents, chunks = total, "corpus chunked");

    let mut entries: Vec<EmbeddedChunk> = Vec::with_capacity(chunks.len());
    let mut dims: Option<usize> = None;

    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(RagError::embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        for (chunk, vector) in batch.iter().zip(vectors) {
            let expected = *dims.get_or_insert(vector.len());
            if vector.is_empty() || vector.len() != expected {
                return Err(RagError::embedding(format!(
                    "inconsistent embedding dimensions for {}#{}: got {}, expected {}",
                    chunk.source_identifier,
                    chunk.chunk_index,
                    vector.len(),
                    expected
                )));
            }
            entries.push(EmbeddedChunk {
                chunk: chunk.clone(),
                vector,
            });
        }

        progress.report(BuildProgressEvent::Embedding {
            n: entries.len() as u64,
            total,
        });
    }

    let meta = IndexMeta {
        build_id: Uuid::new_v4().to_string(),
        embedding_model: embedder.model_name().to_string(),
        dims: dims.unwrap_or(0),
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
        documents,
        chunks: entries.len(),
        built_at: Utc::now(),
    };

    progress.report(BuildProgressEvent::Persisting {
        chunks: entries.len() as u64,
    });
    VectorIndex::replace(&config.index.path, &meta, &entries).await?;

    tracing::info!(
        build_id = %meta.build_id,
        path = %config.index.path.display(),
        chunks = meta.chunks,
        "index built"
    );

    Ok(meta)
}

fn load_and_chunk(config: &Config) -> Result<(usize, Vec<Chunk>)> {
    let docs = load_corpus(&config.corpus)?;

    let chunks: Vec<Chunk> = docs
        .iter()
        .flat_map(|doc| {
            chunk_document(
                doc,
                config.chunking.chunk_size,
                config.chunking.chunk_overlap,
            )
        })
        .collect();

    if chunks.is_empty() {
        return Err(RagError::NoDocuments {
            root: config.corpus.root.clone(),
        });
    }

    Ok((docs.len(), chunks))
}
