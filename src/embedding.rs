//! Embedding capabilities consumed by the chunking engine and embed stage.
//!
//! Two capability seams live here:
//!
//! - [`Embedder`]: batch text → vectors, used by the semantic resplitter only
//!   to compute pairwise distances. Loaded lazily through the
//!   [`ResourceCache`](crate::cache::ResourceCache) via an
//!   [`EmbedderFactory`].
//! - [`VectorStore`]: embeds and stores chunk entries, returning one external
//!   id per stored entry. [`VectorStoreManager`] adds batching with per-batch
//!   fail-soft semantics on top.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::IngestError;

/// Batch text embedding capability.
///
/// The core never interprets vector contents beyond pairwise distances.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model.
    fn id(&self) -> &str;

    /// Embeds a batch of texts, returning one vector per text in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError>;
}

/// Constructs [`Embedder`] handles for the resource cache to own.
#[async_trait]
pub trait EmbedderFactory: Send + Sync {
    async fn load(&self, model: &str) -> Result<Arc<dyn Embedder>, IngestError>;
}

/// Configuration for the remote embedding endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Base URL of the embeddings endpoint.
    pub api_url: String,
    pub api_key: Option<String>,
    /// Default model for document embedding.
    pub model: String,
    /// Batch size for vector-store submission.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.voyageai.com/v1/embeddings".to_string(),
            api_key: None,
            model: "voyage-3.5".to_string(),
            batch_size: 100,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// [`Embedder`] backed by an OpenAI-style JSON embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.api_url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: EmbeddingResponse =
            request.send().await?.error_for_status()?.json().await?;

        if response.data.len() != texts.len() {
            return Err(IngestError::Embedding(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// [`EmbedderFactory`] producing [`HttpEmbedder`] handles.
pub struct HttpEmbedderFactory {
    settings: EmbeddingSettings,
}

impl HttpEmbedderFactory {
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl EmbedderFactory for HttpEmbedderFactory {
    async fn load(&self, model: &str) -> Result<Arc<dyn Embedder>, IngestError> {
        if self.settings.api_key.is_none() {
            return Err(IngestError::Configuration(
                "embedding API key required; set EMBEDDING_API_KEY".into(),
            ));
        }
        Ok(Arc::new(HttpEmbedder::new(&self.settings, model)))
    }
}

/// A chunk entry submitted to the vector store. The id is the UUID join key
/// generated by the embedding stage; it links the relational chunk row with
/// the vector-store entry and must be carried through both unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Embeds and stores chunk entries, returning one external id per entry.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add_chunks(&self, entries: &[VectorEntry]) -> Result<Vec<String>, IngestError>;
}

/// Batching wrapper over a [`VectorStore`].
///
/// A failing batch is logged and skipped rather than aborting the run;
/// partial storage is accepted and reported through the returned id count.
pub struct VectorStoreManager {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl VectorStoreManager {
    pub fn new(store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Submits `entries` in batches, returning the ids of everything stored.
    pub async fn embed_documents(
        &self,
        entries: &[VectorEntry],
    ) -> Result<Vec<String>, IngestError> {
        if entries.is_empty() {
            warn!("no entries provided for embedding");
            return Ok(Vec::new());
        }

        let total_batches = entries.len().div_ceil(self.batch_size);
        let mut stored_ids = Vec::with_capacity(entries.len());

        for (batch_num, batch) in entries.chunks(self.batch_size).enumerate() {
            info!(
                batch = batch_num + 1,
                total_batches,
                size = batch.len(),
                "embedding batch"
            );
            match self.store.add_chunks(batch).await {
                Ok(ids) => stored_ids.extend(ids),
                Err(err) => {
                    warn!(batch = batch_num + 1, error = %err, "batch failed, continuing");
                }
            }
        }

        info!(
            stored = stored_ids.len(),
            submitted = entries.len(),
            "embedding complete"
        );
        Ok(stored_ids)
    }
}
