//! # docsift CLI
//!
//! The `docsift` binary drives the ingestion pipeline and queries the store.
//!
//! ## Usage
//!
//! ```bash
//! docsift --config ./config/docsift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsift init` | Create the SQLite store and its schema |
//! | `docsift extract` | PDFs → JSON records artifacts |
//! | `docsift embed` | Records artifacts → vectors and store entries |
//! | `docsift ingest` | Extract and embed each PDF in one pass |
//! | `docsift query "<text>"` | Ranked matches from the text collection |
//! | `docsift stats` | Entry counts and widths per collection |

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsift::progress::ProgressMode;
use docsift::{config, ingest, migrate, query_cmd, stats};

/// docsift: local multimodal retrieval over PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docsift.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docsift",
    about = "docsift: local PDF ingestion and semantic retrieval over text, tables, and page images",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsift.toml")]
    config: PathBuf,

    /// Progress on stderr. Defaults to `human` on a terminal, otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema. Idempotent.
    Init,

    /// Extract text, tables, and page images from every input PDF.
    ///
    /// Writes one `{stem}.json` records file per document to
    /// `output.records_dir`.
    Extract,

    /// Embed previously extracted records and upsert them into the store.
    Embed,

    /// Extract, embed, and store every input PDF.
    Ingest,

    /// Search the text collection.
    Query {
        /// Free-text query.
        text: String,

        /// Maximum number of results. Defaults to `retrieval.top_k`.
        #[arg(long)]
        limit: Option<usize>,

        /// Print matches as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show collections, widths, and entry counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsift=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized: {}", cfg.store.path.display());
        }
        Commands::Extract => {
            ingest::run_extract(&cfg, progress.as_ref()).await?;
        }
        Commands::Embed => {
            ingest::run_embed(&cfg, progress.as_ref()).await?;
        }
        Commands::Ingest => {
            ingest::run_ingest(&cfg, progress.as_ref()).await?;
        }
        Commands::Query { text, limit, json } => {
            query_cmd::run_query(&cfg, &text, limit, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
