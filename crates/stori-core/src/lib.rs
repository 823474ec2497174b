//! Core types and traits for Stori storage backends.
//!
//! This crate provides the `SummaryStore` trait and the models it moves,
//! enabling pluggable storage implementations in separate crates.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{Summary, SummaryRecord, Transaction};
pub use storage::{StorageError, SummaryStore, WriteStep};
