//! Store statistics.
//!
//! Summarises what is indexed: one line per collection with its metric,
//! vector width, bound model, entry count, and most recent write. Used by `docsift stats`
//! to confirm an `ingest` or `embed` run landed where expected.

use anyhow::Result;

use docsift_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: open the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::open(pool).await?;

    let collections = store.list_collections().await?;
    let last_write: Vec<(String, i64)> =
        sqlx::query_as("SELECT collection, MAX(updated_at) FROM entries GROUP BY collection")
            .fetch_all(store.pool())
            .await?;

    let store_size = std::fs::metadata(&config.store.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let total: usize = collections.iter().map(|c| c.count).sum();

    println!("docsift store");
    println!();
    println!("  Store:       {}", config.store.path.display());
    println!("  Size:        {}", format_bytes(store_size));
    println!("  Entries:     {}", total);

    if !collections.is_empty() {
        println!();
        println!(
            "  {:<28} {:>7} {:>6} {:<20} {:>8}   {}",
            "COLLECTION", "METRIC", "DIMS", "MODEL", "ENTRIES", "LAST WRITE"
        );
        println!("  {}", "-".repeat(93));

        for c in &collections {
            let dims = c
                .dims
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let written = last_write
                .iter()
                .find(|(name, _)| name == &c.name)
                .map(|(_, ts)| format_ts_relative(*ts))
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<28} {:>7} {:>6} {:<20} {:>8}   {}",
                c.name,
                c.metric.as_str(),
                dims,
                c.model.as_deref().unwrap_or("-"),
                c.count,
                written
            );
        }
    }

    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    match delta {
        0..=59 => "just now".to_string(),
        60..=3599 => plural(delta / 60, "min"),
        3600..=86399 => plural(delta / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
