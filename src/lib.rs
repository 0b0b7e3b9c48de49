//! Catalog ingestion library - shared modules for all binaries.

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod payloads;
pub mod progress;
pub mod queries;
pub mod retry;
pub mod safety;
pub mod store;
