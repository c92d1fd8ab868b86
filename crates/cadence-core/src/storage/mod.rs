//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Flat, nullable memory-state columns (NULL until the first review)
//! - Optimistic versioning on every write
//! - Per-item review log
//! - Legacy answer-bag import

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{ImportReport, Result, ReviewLogEntry, ReviewOutcome, Storage, StorageError};
