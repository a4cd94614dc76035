//! Statistics generation from the page store
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::extract::DateStrategy;
use crate::storage::{date_strategy_label, PageStore, RunRecord, StorageResult};
use std::collections::BTreeMap;

/// Page store summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of stored records
    pub total_pages: u64,

    /// Record count per date strategy label ("1" to "4", "none")
    pub pages_by_strategy: BTreeMap<String, u64>,

    /// Records carrying a real summary, excluding failure markers
    pub summarized: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Records with an inferred publication date
    pub fn dated_pages(&self) -> u64 {
        self.pages_by_strategy
            .iter()
            .filter(|(label, _)| label.as_str() != "none")
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn PageStore) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_pages: storage.count_pages()?,
        pages_by_strategy: storage.count_by_date_strategy()?,
        summarized: storage.count_summarized()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Page Store Statistics ===\n");

    println!("Overview:");
    println!("  Stored pages: {}", stats.total_pages);
    println!(
        "  With publication date: {} ({:.1}%)",
        stats.dated_pages(),
        percentage(stats.dated_pages(), stats.total_pages)
    );
    println!("  With summary: {}", stats.summarized);
    println!();

    println!("Pages by Date Strategy:");
    for strategy in [
        DateStrategy::TimeElement,
        DateStrategy::DateClass,
        DateStrategy::MetaTag,
        DateStrategy::TextPattern,
    ] {
        let count = stats
            .pages_by_strategy
            .get(&date_strategy_label(Some(strategy)))
            .copied()
            .unwrap_or(0);
        println!("  {} ({:?}): {}", strategy, strategy, count);
    }
    let undated = stats.pages_by_strategy.get("none").copied().unwrap_or(0);
    println!("  none: {}", undated);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
        }
        None => println!("No crawl runs recorded"),
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
