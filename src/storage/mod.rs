//! Storage module for extracted page records
//!
//! This module handles all database operations for the crawler:
//! - SQLite database initialization and schema management
//! - Idempotent page record insertion
//! - Run tracking for `--stats`

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{PageStore, StorageError, StorageResult};

use crate::extract::{DateStrategy, ParsedPage};
use chrono::Utc;

/// Title stored when a page has none
pub const UNTITLED: &str = "No Title";

/// One extracted page, keyed by URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub text: String,
    /// RFC 3339, or the raw `<time>` value when it could not be parsed
    pub published_at: Option<String>,
    pub date_strategy: Option<DateStrategy>,
    /// Summary text, or a `[summary unavailable: ...]` marker
    pub summary: Option<String>,
    pub fetched_at: String,
}

impl PageRecord {
    /// Builds a record from an extracted page, stamped with the current time
    pub fn from_parsed(url: &str, page: &ParsedPage, summary: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            title: page
                .title
                .clone()
                .unwrap_or_else(|| UNTITLED.to_string()),
            text: page.text.clone(),
            published_at: page.published.as_ref().map(|d| d.value.clone()),
            date_strategy: page.published.as_ref().map(|d| d.strategy),
            summary,
            fetched_at: Utc::now().to_rfc3339(),
        }
    }

    /// Strategy as stored in the database: "1" to "4", or "none"
    pub fn date_strategy_label(&self) -> String {
        date_strategy_label(self.date_strategy)
    }
}

pub fn date_strategy_label(strategy: Option<DateStrategy>) -> String {
    strategy.map_or_else(|| "none".to_string(), |s| s.to_string())
}

pub fn parse_date_strategy_label(label: &str) -> Option<DateStrategy> {
    label.parse::<u8>().ok().and_then(DateStrategy::from_number)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
