//! # docsift Core
//!
//! Runtime-agnostic logic for docsift: content records, the encoder
//! traits and embedding dispatch, the vector store abstraction with an
//! in-memory implementation, and the retrieval query service.
//!
//! This crate contains no tokio, sqlx, PDF, image-decoding, or model
//! dependencies. Concrete encoders, the PDF extractor, and the SQLite store
//! live in the `docsift` app crate.

pub mod embedding;
pub mod error;
pub mod models;
pub mod query;
pub mod store;
