//! Query orchestration.
//!
//! [`ThreatRag`] owns the configuration, the embedding and generation clients,
//! the prompt store, and a lazily opened handle to the vector index. A query
//! runs: ensure index → resolve mode → retrieve → compose → generate → parse.
//!
//! Index preconditions are checked before any external call, so a missing
//! index never costs an embedding or generation round-trip. Builds and
//! retrievals on one engine are serialized through the index handle's mutex.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::{RagError, Result};
use crate::generation::{Generator, OllamaGenerator};
use crate::index::{IndexMeta, VectorIndex};
use crate::ingest;
use crate::mode::{detect_mode, Mode};
use crate::models::RetrievedChunk;
use crate::progress::BuildProgressReporter;
use crate::prompt::PromptStore;
use crate::response::{parse_response, Analysis};

/// Everything a query produced, for callers that want more than the result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub mode: Mode,
    pub mode_forced: bool,
    pub model: String,
    pub context: Vec<RetrievedChunk>,
    pub analysis: Analysis,
}

/// Index location and the description of its last build.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub stored_chunks: usize,
    pub meta: IndexMeta,
}

pub struct ThreatRag {
    config: Config,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    prompts: PromptStore,
    index: Mutex<Option<VectorIndex>>,
}

impl ThreatRag {
    /// Engine wired to the backends named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = embedding::create_embedder(&config.embedding)?;
        let generator = Box::new(OllamaGenerator::new(&config.generation)?);
        Ok(Self::new(config, embedder, generator))
    }

    /// Engine with caller-supplied backends.
    pub fn new(config: Config, embedder: Box<dyn Embedder>, generator: Box<dyn Generator>) -> Self {
        let prompts = PromptStore::new(config.prompts.dir.clone());
        Self {
            config,
            embedder,
            generator,
            prompts,
            index: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rebuild the index from the corpus, replacing any previous one.
    pub async fn build_index(&self, progress: &dyn BuildProgressReporter) -> Result<IndexMeta> {
        let mut slot = self.index.lock().await;
        if let Some(old) = slot.take() {
            old.close().await;
        }

        let meta = ingest::build_index(&self.config, self.embedder.as_ref(), progress).await?;
        *slot = Some(VectorIndex::open(&self.config.index.path).await?);
        Ok(meta)
    }

    /// Open the stored index if this engine has not done so yet.
    pub async fn ensure_index(&self) -> Result<IndexMeta> {
        let mut slot = self.index.lock().await;
        let index = open_slot(&mut slot, &self.config).await?;
        Ok(index.meta().clone())
    }

    /// The `k` stored chunks most similar to `text`, best first.
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let mut slot = self.index.lock().await;
        let index = open_slot(&mut slot, &self.config).await?;

        let query_vector = embedding::embed_query(self.embedder.as_ref(), text).await?;
        index.similarity_search(&query_vector, k).await
    }

    /// Analyse `input` and return the parsed result.
    ///
    /// `model` defaults to the configured default model; `forced_mode`
    /// bypasses keyword detection.
    pub async fn query(
        &self,
        input: &str,
        model: Option<&str>,
        forced_mode: Option<Mode>,
    ) -> Result<Analysis> {
        Ok(self.run_query(input, model, forced_mode).await?.analysis)
    }

    /// Like [`ThreatRag::query`], also returning the mode, model and context used.
    pub async fn run_query(
        &self,
        input: &str,
        model: Option<&str>,
        forced_mode: Option<Mode>,
    ) -> Result<QueryOutcome> {
        self.ensure_index().await?;

        let mode = forced_mode.unwrap_or_else(|| detect_mode(input));
        let model = model
            .unwrap_or_else(|| self.config.generation.default_model())
            .to_string();

        if !self.config.generation.is_allowed(&model) {
            tracing::warn!(model = %model, "model is not in the configured allow-list");
        }
        tracing::info!(mode = %mode, forced = forced_mode.is_some(), model = %model, "running query");

        let context = self.retrieve(input, self.config.retrieval.top_k).await?;
        let prompt = self.prompts.compose(mode, input, &context);

        let raw = self.generator.generate(&model, &prompt).await?;

        let mut analysis = parse_response(&raw);
        if analysis.fill_missing_mode(mode) {
            tracing::debug!("model omitted mode; filled in applied mode");
        }
        if !analysis.is_json() {
            tracing::info!("model output contained no JSON object; returning raw text");
        }

        Ok(QueryOutcome {
            mode,
            mode_forced: forced_mode.is_some(),
            model,
            context,
            analysis,
        })
    }

    /// Describe the stored index.
    pub async fn status(&self) -> Result<IndexStatus> {
        let mut slot = self.index.lock().await;
        let index = open_slot(&mut slot, &self.config).await?;

        let size_bytes = std::fs::metadata(index.path())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(IndexStatus {
            path: index.path().to_path_buf(),
            size_bytes,
            stored_chunks: index.chunk_count().await?,
            meta: index.meta().clone(),
        })
    }

    /// Release the index handle.
    pub async fn close(&self) {
        if let Some(index) = self.index.lock().await.take() {
            index.close().await;
        }
    }
}

async fn open_slot<'a>(
    slot: &'a mut Option<VectorIndex>,
    config: &Config,
) -> Result<&'a VectorIndex> {
    let index = match slot.take() {
        Some(index) => index,
        None => {
            tracing::debug!(path = %config.index.path.display(), "opening index");
            VectorIndex::open(&config.index.path).await?
        }
    };
    Ok(&*slot.insert(index))
}

impl std::fmt::Debug for ThreatRag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreatRag")
            .field("index", &self.config.index.path)
            .field("embedding_model", &self.embedder.model_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NeverEmbed;

    #[async_trait]
    impl Embedder for NeverEmbed {
        fn model_name(&self) -> &str {
            "never"
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            panic!("embedder must not be called");
        }
    }

    struct NeverGenerate;

    #[async_trait]
    impl Generator for NeverGenerate {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
            panic!("generator must not be called");
        }
    }

    fn engine(tmp: &TempDir) -> ThreatRag {
        let mut config = Config::default();
        config.index.path = tmp.path().join("vectorstore/index.sqlite");
        config.corpus.root = tmp.path().join("reports");
        config.prompts.dir = tmp.path().join("prompts");
        ThreatRag::new(config, Box::new(NeverEmbed), Box::new(NeverGenerate))
    }

    #[tokio::test]
    async fn test_query_without_index_fails_before_external_calls() {
        let tmp = TempDir::new().unwrap();
        let rag = engine(&tmp);
        let err = rag.query("failed login", None, None).await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_without_index_fails() {
        let tmp = TempDir::new().unwrap();
        let rag = engine(&tmp);
        let err = rag.retrieve("apt29", 5).await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn test_build_with_missing_corpus_fails_before_embedding() {
        let tmp = TempDir::new().unwrap();
        let rag = engine(&tmp);
        let err = rag
            .build_index(&crate::progress::NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NoDocuments { .. }));
        assert!(!tmp.path().join("vectorstore/index.sqlite").exists());
    }
}
