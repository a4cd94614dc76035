//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PageRecord, RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for page store implementations
///
/// Records are insert-only: a second insert for a URL is ignored, never merged.
pub trait PageStore {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Page Records =====

    /// Inserts a record unless one already exists for its URL
    ///
    /// Returns true if the record was written.
    fn insert_page_if_absent(&mut self, record: &PageRecord, run_id: Option<i64>)
        -> StorageResult<bool>;

    /// Gets a record by URL
    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets every record in insertion order
    fn all_pages(&self) -> StorageResult<Vec<PageRecord>>;

    // ===== Statistics =====

    /// Gets total record count
    fn count_pages(&self) -> StorageResult<u64>;

    /// Counts records per date strategy label ("1".."4", "none")
    fn count_by_date_strategy(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Counts records carrying a summary that is not a failure marker
    fn count_summarized(&self) -> StorageResult<u64>;
}
