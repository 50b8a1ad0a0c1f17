//! File-backed vector index.
//!
//! The index is a single SQLite file holding every chunk with its embedding
//! BLOB, plus one metadata row describing the build that produced it.
//! Similarity search loads all vectors and ranks them by cosine similarity in
//! Rust; threat-report corpora are small enough that a flat scan is fine.
//!
//! Writers go through [`VectorIndex::replace`], which swaps the full contents
//! inside one transaction. Readers open with [`VectorIndex::open`], which never
//! creates anything and fails with [`RagError::IndexNotFound`] when no build
//! has completed at the location.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{Chunk, RetrievedChunk};

/// Description of a completed build.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexMeta {
    pub build_id: String,
    pub embedding_model: String,
    pub dims: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub documents: usize,
    pub chunks: usize,
    pub built_at: DateTime<Utc>,
}

/// A chunk paired with its embedding, ready to persist.
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// An open, queryable index.
pub struct VectorIndex {
    pool: SqlitePool,
    path: PathBuf,
    meta: IndexMeta,
}

impl VectorIndex {
    /// Open a previously built index without modifying it.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_existing(path).await?;

        if !migrate::schema_present(&pool).await? {
            pool.close().await;
            return Err(RagError::IndexNotFound {
                path: path.to_path_buf(),
            });
        }

        let meta = match load_meta(&pool).await? {
            Some(meta) => meta,
            None => {
                pool.close().await;
                return Err(RagError::IndexNotFound {
                    path: path.to_path_buf(),
                });
            }
        };

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            meta,
        })
    }

    /// Replace whatever is stored at `path` with `entries`.
    ///
    /// All rows are deleted and re-inserted in a single transaction, so a
    /// failure leaves the previous build untouched and concurrent readers
    /// never see a half-written index.
    pub async fn replace(path: &Path, meta: &IndexMeta, entries: &[EmbeddedChunk]) -> Result<()> {
        let pool = db::connect_writable(path).await?;
        migrate::run_migrations(&pool).await?;

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            let chunk = &entry.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunks (source_identifier, chunk_index, start_char, end_char, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.source_identifier)
            .bind(chunk.chunk_index)
            .bind(chunk.start as i64)
            .bind(chunk.end as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO index_meta (id, build_id, embedding_model, dims, chunk_size, chunk_overlap, documents, chunks, built_at)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&meta.build_id)
        .bind(&meta.embedding_model)
        .bind(meta.dims as i64)
        .bind(meta.chunk_size as i64)
        .bind(meta.chunk_overlap as i64)
        .bind(meta.documents as i64)
        .bind(meta.chunks as i64)
        .bind(meta.built_at.timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        pool.close().await;
        Ok(())
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of chunk rows actually stored.
    pub async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    /// Return the `k` chunks most similar to `query_vector`, best first.
    ///
    /// Ties are broken by source identifier and chunk index.
    pub async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if query_vector.len() != self.meta.dims {
            return Err(RagError::embedding(format!(
                "query embedding has {} dimensions but the index was built with {} ({}); rebuild the index",
                query_vector.len(),
                self.meta.dims,
                self.meta.embedding_model
            )));
        }

        let rows = sqlx::query(
            "SELECT source_identifier, chunk_index, start_char, end_char, text, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let start: i64 = row.get("start_char");
                let end: i64 = row.get("end_char");
                RetrievedChunk {
                    source_identifier: row.get("source_identifier"),
                    chunk_index: row.get("chunk_index"),
                    start: start as usize,
                    end: end as usize,
                    text: row.get("text"),
                    score: cosine_similarity(query_vector, &vector),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_identifier.cmp(&b.source_identifier))
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(k);

        Ok(hits)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn load_meta(pool: &SqlitePool) -> Result<Option<IndexMeta>> {
    let row = sqlx::query(
        r#"
        SELECT build_id, embedding_model, dims, chunk_size, chunk_overlap, documents, chunks, built_at
        FROM index_meta WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let dims: i64 = row.get("dims");
        let chunk_size: i64 = row.get("chunk_size");
        let chunk_overlap: i64 = row.get("chunk_overlap");
        let documents: i64 = row.get("documents");
        let chunks: i64 = row.get("chunks");
        let built_at: i64 = row.get("built_at");
        IndexMeta {
            build_id: row.get("build_id"),
            embedding_model: row.get("embedding_model"),
            dims: dims as usize,
            chunk_size: chunk_size as usize,
            chunk_overlap: chunk_overlap as usize,
            documents: documents as usize,
            chunks: chunks as usize,
            built_at: Utc.timestamp_opt(built_at, 0).single().unwrap_or_default(),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(source: &str, index: i64, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                source_identifier: source.to_string(),
                chunk_index: index,
                start: 0,
                end: 4,
                text: format!("{}#{}", source, index),
                hash: String::new(),
            },
            vector,
        }
    }

    fn meta(chunks: usize) -> IndexMeta {
        IndexMeta {
            build_id: "test".to_string(),
            embedding_model: "unit".to_string(),
            dims: 2,
            chunk_size: 800,
            chunk_overlap: 200,
            documents: 1,
            chunks,
            built_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_open_missing_is_index_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = VectorIndex::open(&tmp.path().join("none.sqlite"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RagError::IndexNotFound { .. }));
        assert!(!tmp.path().join("none.sqlite").exists());
    }

    #[tokio::test]
    async fn test_replace_then_search_ranked() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let entries = vec![
            entry("a.txt", 0, vec![1.0, 0.0]),
            entry("b.txt", 0, vec![0.0, 1.0]),
            entry("c.txt", 0, vec![0.7, 0.7]),
        ];
        VectorIndex::replace(&path, &meta(3), &entries).await.unwrap();

        let index = VectorIndex::open(&path).await.unwrap();
        assert_eq!(index.meta(), &meta(3));
        let hits = index.similarity_search(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_identifier, "a.txt");
        assert_eq!(hits[1].source_identifier, "c.txt");
        assert!(hits[0].score >= hits[1].score);
        index.close().await;
    }

    #[tokio::test]
    async fn test_replace_does_not_append() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let entries = vec![entry("a.txt", 0, vec![1.0, 0.0]), entry("a.txt", 1, vec![0.0, 1.0])];

        VectorIndex::replace(&path, &meta(2), &entries).await.unwrap();
        VectorIndex::replace(&path, &meta(2), &entries).await.unwrap();

        let index = VectorIndex::open(&path).await.unwrap();
        assert_eq!(index.chunk_count().await.unwrap(), 2);
        index.close().await;
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        VectorIndex::replace(&path, &meta(1), &[entry("a.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let index = VectorIndex::open(&path).await.unwrap();
        let err = index.similarity_search(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, RagError::ServiceUnavailable { .. }));
        index.close().await;
    }

    #[tokio::test]
    async fn test_tie_break_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let entries = vec![
            entry("b.txt", 1, vec![1.0, 0.0]),
            entry("b.txt", 0, vec![1.0, 0.0]),
            entry("a.txt", 3, vec![1.0, 0.0]),
        ];
        VectorIndex::replace(&path, &meta(3), &entries).await.unwrap();

        let index = VectorIndex::open(&path).await.unwrap();
        let hits = index.similarity_search(&[1.0, 0.0], 5).await.unwrap();
        let order: Vec<(String, i64)> = hits
            .iter()
            .map(|h| (h.source_identifier.clone(), h.chunk_index))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.txt".to_string(), 3),
                ("b.txt".to_string(), 0),
                ("b.txt".to_string(), 1)
            ]
        );
        index.close().await;
    }
}
