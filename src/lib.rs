//! # docsift
//!
//! A local multimodal ingestion and retrieval pipeline for PDF documents.
//!
//! docsift reads a directory of PDFs, extracts page text, tables, and
//! rendered page images, embeds each record with a local text or image
//! model, and stores the vectors in a SQLite-backed collection that can be
//! queried by free text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │   PDFs   │──▶│ Extractor │──▶│ Normalizer │──▶│ Encoders │
//! └──────────┘   └─────┬─────┘   └────────────┘   └────┬─────┘
//!                      │ records JSON                  │ vectors JSON
//!                      ▼                               ▼
//!                 data/records                    ┌──────────┐
//!                                                 │  SQLite  │◀── query
//!                                                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsift init                     # create the store
//! docsift ingest                   # extract + embed every PDF
//! docsift query "calibration steps"
//! docsift stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scan`] | Input discovery |
//! | [`extract`] | PDF → content records |
//! | [`normalize`] | Records → encoder inputs |
//! | [`embedding`] | Local fastembed encoders |
//! | [`artifacts`] | Records and vector JSON files |
//! | [`ingest`] | Batch pipeline |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Storage-agnostic types (records, encoder traits, the store trait, and the
//! query service) live in the `docsift-core` crate.

pub mod artifacts;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod normalize;
pub mod progress;
pub mod query_cmd;
pub mod scan;
pub mod sqlite_store;
pub mod stats;
