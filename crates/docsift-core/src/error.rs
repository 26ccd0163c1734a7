//! Typed errors for the store and query seams.
//!
//! Store errors are recoverable by the caller (a rejected upsert leaves the
//! collection untouched); query errors are reported back to whoever issued
//! the query and never change stored state.

use thiserror::Error;

/// Errors returned by a [`VectorStore`](crate::store::VectorStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A vector's width differs from the collection's established width.
    #[error("dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// The collection was never created with `ensure_collection`.
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    /// `ensure_collection` was called with a metric other than the stored one.
    #[error("collection '{collection}' uses metric '{existing}', not '{requested}'")]
    MetricMismatch {
        collection: String,
        existing: String,
        requested: String,
    },

    /// The collection was filled by another encoder model. Vectors from
    /// different models are not comparable even at equal width.
    #[error("collection '{collection}' holds vectors from model '{existing}', not '{requested}'")]
    ModelMismatch {
        collection: String,
        existing: String,
        requested: String,
    },

    /// Zero-length vectors cannot establish or match a dimensionality.
    #[error("empty vector for entry '{0}'")]
    EmptyVector(String),

    /// Failure inside the storage engine (I/O, SQL, poisoned lock).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors returned by the retrieval path.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Empty or whitespace-only query text; rejected before any encoder call.
    #[error("query text is empty")]
    EmptyQuery,

    /// The text encoder failed to embed the query.
    #[error("query embedding failed: {0}")]
    Encoder(#[source] anyhow::Error),

    /// The store rejected the query (including dimension mismatches).
    #[error(transparent)]
    Store(#[from] StoreError),
}
