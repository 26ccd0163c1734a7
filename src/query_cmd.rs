//! `docsift query`: free-text retrieval over the text collection.

use std::sync::Arc;

use anyhow::{bail, Result};

use docsift_core::error::QueryError;
use docsift_core::models::{ContentKind, MetadataValue};
use docsift_core::query::{QueryHit, QueryOutcome, QueryService};
use docsift_core::store::{collection_for, Collection, VectorStore};

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

const EXCERPT_CHARS: usize = 240;

pub async fn run_query(config: &Config, text: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let k = limit.unwrap_or(config.retrieval.top_k);
    if k == 0 {
        bail!("--limit must be >= 1");
    }

    // Queries only need the text model.
    let text_only = EmbeddingConfig {
        image_model: None,
        ..config.embedding.clone()
    };
    let generator = embedding::load_generator(&text_only).await?;

    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::open(pool).await?);
    let name = collection_for(&config.store.collection, ContentKind::Text);
    let collection = Collection::open(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        &name,
        config.store.metric,
        generator.text_encoder(),
    )
    .await?;
    let service = QueryService::new(collection);

    let outcome = match service.query(text, k).await {
        Ok(outcome) => outcome,
        Err(QueryError::EmptyQuery) => {
            store.close().await;
            bail!("Query text is empty");
        }
        Err(e) => {
            store.close().await;
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(outcome.hits())?);
    } else {
        print_outcome(&outcome);
    }

    store.close().await;
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome) {
    let hits = match outcome {
        QueryOutcome::Matches(hits) => hits,
        QueryOutcome::NoMatches => {
            println!("No matches.");
            return;
        }
    };
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} p.{} ({})",
            i + 1,
            hit.score,
            meta(hit, "source"),
            meta(hit, "page"),
            meta(hit, "kind")
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.document));
        println!("    id: {}", hit.id);
        println!();
    }
}

fn meta(hit: &QueryHit, key: &str) -> String {
    hit.metadata
        .get(key)
        .map(MetadataValue::to_string)
        .unwrap_or_else(|| "?".to_string())
}

fn excerpt(document: &str) -> String {
    let flat = document.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
