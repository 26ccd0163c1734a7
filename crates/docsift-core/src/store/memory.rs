//! In-memory [`VectorStore`] implementation for testing and embedding in
//! other programs.
//!
//! Uses `HashMap`s behind `std::sync::RwLock` for thread safety. Queries are
//! a brute-force scan under the collection's metric.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::Metric;
use crate::error::StoreError;
use crate::models::{SearchHit, StoredEntry};

use super::{rank, CollectionInfo, VectorStore};

struct MemCollection {
    metric: Metric,
    dims: Option<usize>,
    model: Option<String>,
    entries: HashMap<String, StoredEntry>,
}

impl MemCollection {
    fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            metric: self.metric,
            dims: self.dims,
            model: self.model.clone(),
            count: self.entries.len(),
        }
    }
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemCollection>>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemCollection>>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(
        &self,
        name: &str,
        metric: Metric,
    ) -> Result<CollectionInfo, StoreError> {
        let mut collections = self.write()?;
        let coll = collections
            .entry(name.to_string())
            .or_insert_with(|| MemCollection {
                metric,
                dims: None,
                model: None,
                entries: HashMap::new(),
            });
        if coll.metric != metric {
            return Err(StoreError::MetricMismatch {
                collection: name.to_string(),
                existing: coll.metric.to_string(),
                requested: metric.to_string(),
            });
        }
        Ok(coll.info(name))
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        Ok(self.read()?.get(name).map(|c| c.info(name)))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StoreError> {
        let collections = self.read()?;
        let mut infos: Vec<CollectionInfo> =
            collections.iter().map(|(name, c)| c.info(name)).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn bind_model(&self, collection: &str, model: &str) -> Result<(), StoreError> {
        let mut collections = self.write()?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        match &coll.model {
            Some(existing) if existing != model => Err(StoreError::ModelMismatch {
                collection: collection.to_string(),
                existing: existing.clone(),
                requested: model.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                coll.model = Some(model.to_string());
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, entry: &StoredEntry) -> Result<(), StoreError> {
        if entry.vector.is_empty() {
            return Err(StoreError::EmptyVector(entry.id.clone()));
        }
        let mut collections = self.write()?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        match coll.dims {
            Some(dims) if dims != entry.vector.len() => {
                return Err(StoreError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: dims,
                    actual: entry.vector.len(),
                });
            }
            Some(_) => {}
            None => coll.dims = Some(entry.vector.len()),
        }

        coll.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>, StoreError> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|c| c.entries.get(id).cloned()))
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let collections = self.read()?;
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };
        let dims = match coll.dims {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        if vector.len() != dims {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: dims,
                actual: vector.len(),
            });
        }

        let hits = coll
            .entries
            .values()
            .map(|e| SearchHit {
                id: e.id.clone(),
                score: coll.metric.score(vector, &e.vector),
                metadata: e.metadata.clone(),
                document: e.document.clone(),
            })
            .collect();
        Ok(rank(hits, k))
    }
}
