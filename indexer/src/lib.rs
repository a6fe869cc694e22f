//! Indexer for tm2/gno chains.
//!
//! Blocks are fetched from a node in chunks, transactions are decoded from their amino envelopes,
//! addresses are replaced by storage-assigned surrogate ids, and everything is bulk written to
//! Postgres. See [`orchestrator::Orchestrator`] for the per-chunk pipeline.

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod query;
pub mod setup;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use error::{IndexerError, IndexerResult};
