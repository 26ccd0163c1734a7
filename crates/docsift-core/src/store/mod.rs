//! Vector store abstraction for docsift.
//!
//! The [`VectorStore`] trait is the narrow interface the pipeline and the
//! query service use to persist and search vectors, enabling pluggable
//! backends (SQLite in the app crate, in-memory here).
//!
//! Implementations must be `Send + Sync`; concurrent upserts are allowed and
//! resolve as last-writer-wins per id.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::{Metric, TextEncoder};
use crate::error::{QueryError, StoreError};
use crate::models::{ContentKind, SearchHit, StoredEntry};

/// Description of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub metric: Metric,
    /// Established by the first upsert; `None` while empty.
    pub dims: Option<usize>,
    /// Encoder model bound with [`VectorStore::bind_model`].
    pub model: Option<String>,
    pub count: usize,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | Get-or-create a collection |
/// | [`collection_info`](VectorStore::collection_info) | Metric, width, and size |
/// | [`list_collections`](VectorStore::list_collections) | All collections |
/// | [`bind_model`](VectorStore::bind_model) | Pin the encoder model |
/// | [`count`](VectorStore::count) | Entries in one collection |
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite an entry by id |
/// | [`get`](VectorStore::get) | Fetch an entry by id |
/// | [`query`](VectorStore::query) | k nearest entries, best-first |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing. Idempotent; fails with
    /// [`StoreError::MetricMismatch`] if it exists with another metric.
    async fn ensure_collection(
        &self,
        name: &str,
        metric: Metric,
    ) -> Result<CollectionInfo, StoreError>;

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError>;

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StoreError>;

    /// Record the encoder model that fills `collection`. The first call
    /// binds it; a later call naming another model fails with
    /// [`StoreError::ModelMismatch`] and changes nothing.
    async fn bind_model(&self, collection: &str, model: &str) -> Result<(), StoreError>;

    /// Number of entries; `0` for an unknown collection.
    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self
            .collection_info(collection)
            .await?
            .map(|c| c.count)
            .unwrap_or(0))
    }

    /// Insert or overwrite by `entry.id`.
    ///
    /// A vector whose width differs from the collection's width fails with
    /// [`StoreError::DimensionMismatch`] and leaves the collection unchanged.
    async fn upsert(&self, collection: &str, entry: &StoredEntry) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>, StoreError>;

    /// Up to `k` entries ordered best-first under the collection's metric.
    ///
    /// An empty or unknown collection yields an empty result.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;
}

/// Physical collection holding vectors of one modality.
///
/// Text and table records share the text encoder and therefore one
/// collection; images live in their own.
pub fn collection_for(base: &str, kind: ContentKind) -> String {
    match kind {
        ContentKind::Text | ContentKind::Table => format!("{}.text", base),
        ContentKind::Image => format!("{}.image", base),
    }
}

/// Sort hits best-first and keep the top `k`. Equal scores fall back to id
/// order so results are stable across backends.
pub fn rank(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

/// What to search with.
#[derive(Debug, Clone, Copy)]
pub enum QueryInput<'a> {
    Vector(&'a [f32]),
    /// Embedded with the collection's text encoder before searching.
    Text(&'a str),
}

/// A store collection bound to the text encoder used to fill it.
///
/// Querying by text always goes through the same encoder that produced the
/// stored text vectors.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn VectorStore>,
    name: String,
    encoder: Arc<dyn TextEncoder>,
}

impl Collection {
    /// Get-or-create `name` and bind it to `encoder`.
    ///
    /// Fails if the collection already holds vectors of another width or
    /// from another model.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        name: &str,
        metric: Metric,
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self, StoreError> {
        let info = store.ensure_collection(name, metric).await?;
        if let Some(dims) = info.dims {
            if dims != encoder.dims() {
                return Err(StoreError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: dims,
                    actual: encoder.dims(),
                });
            }
        }
        store.bind_model(name, encoder.model_name()).await?;
        Ok(Self {
            store,
            name: name.to_string(),
            encoder,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoder(&self) -> &Arc<dyn TextEncoder> {
        &self.encoder
    }

    pub async fn upsert(&self, entry: &StoredEntry) -> Result<(), StoreError> {
        self.store.upsert(&self.name, entry).await
    }

    pub async fn query_text(&self, text: &str, k: usize) -> Result<Vec<SearchHit>, QueryError> {
        self.query(QueryInput::Text(text), k).await
    }

    pub async fn query(&self, input: QueryInput<'_>, k: usize) -> Result<Vec<SearchHit>, QueryError> {
        match input {
            QueryInput::Vector(v) => Ok(self.store.query(&self.name, v, k).await?),
            QueryInput::Text(text) => {
                let mut vectors = self
                    .encoder
                    .embed_text(&[text.to_string()])
                    .map_err(QueryError::Encoder)?;
                let vector = vectors
                    .pop()
                    .ok_or_else(|| QueryError::Encoder(anyhow::anyhow!("Empty embedding response")))?;
                if vector.len() != self.encoder.dims() {
                    return Err(QueryError::Encoder(anyhow::anyhow!(
                        "Encoder '{}' returned a {}-dim vector, expected {}",
                        self.encoder.model_name(),
                        vector.len(),
                        self.encoder.dims()
                    )));
                }
                Ok(self.store.query(&self.name, &vector, k).await?)
            }
        }
    }
}
