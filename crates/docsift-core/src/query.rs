//! Retrieval query service.
//!
//! Wraps a [`Collection`] and turns free-text queries into ranked hits. The
//! service is `Idle` until a query is in flight and reports `Querying` while
//! at least one is running; queries never modify stored state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::QueryError;
use crate::models::{Metadata, SearchHit};
use crate::store::{Collection, QueryInput};

/// Lifecycle state of a [`QueryService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Querying,
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl From<SearchHit> for QueryHit {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            document: hit.document,
            score: hit.score,
            metadata: hit.metadata,
        }
    }
}

/// Result of a successful query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// At most `k` hits, best-first.
    Matches(Vec<QueryHit>),
    NoMatches,
}

impl QueryOutcome {
    pub fn hits(&self) -> &[QueryHit] {
        match self {
            QueryOutcome::Matches(hits) => hits,
            QueryOutcome::NoMatches => &[],
        }
    }
}

/// Free-text retrieval over one collection.
#[derive(Clone)]
pub struct QueryService {
    collection: Collection,
    in_flight: Arc<AtomicUsize>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl QueryService {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> QueryState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            QueryState::Querying
        } else {
            QueryState::Idle
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Embed `text` and return the `k` nearest entries.
    ///
    /// Whitespace-only text fails with [`QueryError::EmptyQuery`] without
    /// touching the encoder.
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryOutcome, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let _guard = InFlight::enter(&self.in_flight);
        let hits = self.collection.query(QueryInput::Text(text), k).await?;
        debug!(collection = self.collection.name(), hits = hits.len(), "query complete");

        if hits.is_empty() {
            Ok(QueryOutcome::NoMatches)
        } else {
            Ok(QueryOutcome::Matches(
                hits.into_iter().map(QueryHit::from).collect(),
            ))
        }
    }
}
