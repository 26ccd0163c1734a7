//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs (see
//! [`vec_to_blob`](docsift_core::embedding::vec_to_blob)); queries load a
//! collection's vectors and rank them in process, which is adequate for
//! the tens of thousands of entries a document corpus produces.
//!
//! Writes from one `SqliteStore` are serialized through an async mutex, and
//! every write transaction starts with a write statement so SQLite takes the
//! write lock up front. A deferred transaction that reads first and upgrades
//! later fails with `SQLITE_BUSY` under WAL without consulting the busy
//! handler.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use docsift_core::embedding::{blob_to_vec, vec_to_blob, Metric};
use docsift_core::error::StoreError;
use docsift_core::models::{Metadata, SearchHit, StoredEntry};
use docsift_core::store::{rank, CollectionInfo, VectorStore};

use crate::migrate;

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    /// Wrap an open pool, creating the schema if needed.
    pub async fn open(pool: SqlitePool) -> anyhow::Result<Self> {
        migrate::apply(&pool).await?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn load_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT c.metric, c.dims, c.model,
                   (SELECT COUNT(*) FROM entries e WHERE e.collection = c.name) AS count
            FROM collections c
            WHERE c.name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(row_to_info(name, &row)?)),
            None => Ok(None),
        }
    }
}

fn row_to_info(name: &str, row: &sqlx::sqlite::SqliteRow) -> Result<CollectionInfo, StoreError> {
    let metric: String = row.get("metric");
    let dims: Option<i64> = row.get("dims");
    let count: i64 = row.get("count");
    Ok(CollectionInfo {
        name: name.to_string(),
        metric: metric.parse().map_err(StoreError::Backend)?,
        dims: dims.map(|d| d as usize),
        model: row.get("model"),
        count: count as usize,
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection(
        &self,
        name: &str,
        metric: Metric,
    ) -> Result<CollectionInfo, StoreError> {
        let now = chrono::Utc::now().timestamp();
        {
            let _writer = self.write_lock.lock().await;
            sqlx::query(
                "INSERT INTO collections (name, metric, dims, created_at) VALUES (?, ?, NULL, ?) \
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(name)
            .bind(metric.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        }

        let info = self
            .load_info(name)
            .await?
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?;
        if info.metric != metric {
            return Err(StoreError::MetricMismatch {
                collection: name.to_string(),
                existing: info.metric.to_string(),
                requested: metric.to_string(),
            });
        }
        Ok(info)
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        self.load_info(name).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.name, c.metric, c.dims, c.model,
                   (SELECT COUNT(*) FROM entries e WHERE e.collection = c.name) AS count
            FROM collections c
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let name: String = row.get("name");
                row_to_info(&name, row)
            })
            .collect()
    }

    async fn bind_model(&self, collection: &str, model: &str) -> Result<(), StoreError> {
        let _writer = self.write_lock.lock().await;
        sqlx::query("UPDATE collections SET model = ? WHERE name = ? AND model IS NULL")
            .bind(model)
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        let existing: Option<Option<String>> =
            sqlx::query_scalar("SELECT model FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        match existing {
            None => Err(StoreError::UnknownCollection(collection.to_string())),
            Some(Some(existing)) if existing != model => Err(StoreError::ModelMismatch {
                collection: collection.to_string(),
                existing,
                requested: model.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    async fn upsert(&self, collection: &str, entry: &StoredEntry) -> Result<(), StoreError> {
        if entry.vector.is_empty() {
            return Err(StoreError::EmptyVector(entry.id.clone()));
        }
        let width = entry.vector.len() as i64;
        let metadata_json = serde_json::to_string(&entry.metadata).map_err(backend)?;
        let now = chrono::Utc::now().timestamp();

        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Write first so the transaction holds the write lock from the start.
        // A NULL width is set here; an established one is left alone.
        let updated = sqlx::query("UPDATE collections SET dims = COALESCE(dims, ?) WHERE name = ?")
            .bind(width)
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }

        let dims: i64 = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        if dims != width {
            // Dropping `tx` rolls back.
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: dims as usize,
                actual: entry.vector.len(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO entries (collection, id, dims, vector, metadata_json, document, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                dims = excluded.dims,
                vector = excluded.vector,
                metadata_json = excluded.metadata_json,
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(&entry.id)
        .bind(width)
        .bind(vec_to_blob(&entry.vector))
        .bind(&metadata_json)
        .bind(&entry.document)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT id, vector, metadata_json, document FROM entries WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => {
                let blob: Vec<u8> = row.get("vector");
                let metadata_json: String = row.get("metadata_json");
                Ok(Some(StoredEntry {
                    id: row.get("id"),
                    vector: blob_to_vec(&blob),
                    metadata: parse_metadata(&metadata_json)?,
                    document: row.get("document"),
                }))
            }
            None => Ok(None),
        }
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let info = match self.load_info(collection).await? {
            Some(info) => info,
            None => return Ok(Vec::new()),
        };
        let dims = match info.dims {
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

        let rows = sqlx::query(
            "SELECT id, vector, metadata_json, document FROM entries WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("vector");
            let metadata_json: String = row.get("metadata_json");
            hits.push(SearchHit {
                id: row.get("id"),
                score: info.metric.score(vector, &blob_to_vec(&blob)),
                metadata: parse_metadata(&metadata_json)?,
                document: row.get("document"),
            });
        }

        Ok(rank(hits, k))
    }
}

fn parse_metadata(json: &str) -> Result<Metadata, StoreError> {
    serde_json::from_str(json).map_err(backend)
}
