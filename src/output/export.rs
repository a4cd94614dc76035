//! JSON export of stored page records

use crate::storage::{PageRecord, PageStore};
use crate::GatherError;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One record as written to the export file
#[derive(Debug, Serialize)]
pub struct ExportedPage<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub text: &'a str,
    pub published_at: Option<&'a str>,
    /// 1 to 4, or null when no date was found
    pub date_strategy: Option<u8>,
    pub summary: Option<&'a str>,
    pub fetched_at: &'a str,
}

impl<'a> From<&'a PageRecord> for ExportedPage<'a> {
    fn from(record: &'a PageRecord) -> Self {
        Self {
            url: &record.url,
            title: &record.title,
            text: &record.text,
            published_at: record.published_at.as_deref(),
            date_strategy: record.date_strategy.map(|s| s.number()),
            summary: record.summary.as_deref(),
            fetched_at: &record.fetched_at,
        }
    }
}

/// Writes every stored record to `path` as a pretty-printed JSON array
///
/// Returns the number of records written.
pub fn export_json(storage: &dyn PageStore, path: &Path) -> Result<usize, GatherError> {
    let records = storage.all_pages()?;
    let pages: Vec<ExportedPage<'_>> = records.iter().map(ExportedPage::from).collect();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &pages)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(records = pages.len(), path = %path.display(), "Exported page records");
    Ok(pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DateStrategy;
    use crate::storage::SqliteStorage;
    use tempfile::TempDir;

    #[test]
    fn test_export_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blog").join("data.json");

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_page_if_absent(
                &PageRecord {
                    url: "https://example.com/post".to_string(),
                    title: "Post".to_string(),
                    text: "Body".to_string(),
                    published_at: Some("2023-01-05T00:00:00+00:00".to_string()),
                    date_strategy: Some(DateStrategy::TimeElement),
                    summary: None,
                    fetched_at: "2023-02-01T00:00:00+00:00".to_string(),
                },
                None,
            )
            .unwrap();

        assert_eq!(export_json(&storage, &path).unwrap(), 1);

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let page = &value[0];
        assert_eq!(page["url"], "https://example.com/post");
        assert_eq!(page["date_strategy"], 1);
        assert!(page["summary"].is_null());
    }

    #[test]
    fn test_export_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let storage = SqliteStorage::new_in_memory().unwrap();

        assert_eq!(export_json(&storage, &path).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
