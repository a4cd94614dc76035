//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the PageStore trait.

use crate::storage::schema::{get_schema_version, initialize_schema, SCHEMA_VERSION};
use crate::storage::traits::{PageStore, StorageError, StorageResult};
use crate::storage::{parse_date_strategy_label, PageRecord, RunRecord, RunStatus};
use crate::GatherError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const PAGE_COLUMNS: &str =
    "url, title, text, published_at, date_strategy, summary, fetched_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`, creating parent directories
    pub fn new(path: &Path) -> Result<Self, GatherError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        let found = get_schema_version(&conn)?;
        if found > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            }
            .into());
        }

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, GatherError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        url: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        published_at: row.get(3)?,
        date_strategy: parse_date_strategy_label(&row.get::<_, String>(4)?),
        summary: row.get(5)?,
        fetched_at: row.get(6)?,
    })
}

impl PageStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Records =====

    fn insert_page_if_absent(
        &mut self,
        record: &PageRecord,
        run_id: Option<i64>,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO pages (url, title, text, published_at, date_strategy, summary, fetched_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(url) DO NOTHING",
            params![
                record.url,
                record.title,
                record.text,
                record.published_at,
                record.date_strategy_label(),
                record.summary,
                record.fetched_at,
                run_id,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS),
                params![url],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn all_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM pages ORDER BY id", PAGE_COLUMNS))?;
        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    // ===== Statistics =====

    fn count_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_date_strategy(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date_strategy, COUNT(*) FROM pages GROUP BY date_strategy")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (label, count) = row?;
            counts.insert(label, count);
        }
        Ok(counts)
    }

    fn count_summarized(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE summary IS NOT NULL AND summary NOT LIKE ?1",
            params![format!("{}%", crate::summarize::FAILURE_PREFIX)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
