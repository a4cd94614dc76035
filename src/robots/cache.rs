//! Per-host robots.txt cache
//!
//! Each host gets one `OnceCell`. The map lock is only held to find or insert
//! the cell; the fetch runs inside the cell's initializer, so concurrent first
//! queries for a host share a single download and later queries never refetch.

use crate::robots::ParsedRobots;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<ParsedRobots>>>>,
    fetches: AtomicUsize,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for `host`, running `fetch` if there are none yet
    pub async fn get_or_fetch<F, Fut>(&self, host: &str, fetch: F) -> ParsedRobots
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(entries.entry(host.to_string()).or_default())
        };

        cell.get_or_init(move || async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            fetch().await
        })
        .await
        .clone()
    }

    /// Number of hosts whose rules were fetched
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}
