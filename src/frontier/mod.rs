//! URL frontier
//!
//! The frontier owns three disjoint URL sets: `pending` (discovered, not yet
//! claimed), `in_flight` (claimed by a worker) and `done` (processed). All of
//! them live behind one mutex, so a claim, a completion and the exhaustion
//! check each see a consistent view. The lock is never held across an await.
//!
//! After every mutation the frontier is checkpointed to two sorted files. The
//! queue file holds `pending ∪ in_flight`, so a URL claimed when the process
//! dies is picked up again on resume.

mod persistence;

pub use persistence::{load_url_list, write_url_list, FrontierFiles};

use crate::url::{is_in_scope, scoped_link};
use crate::Result;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// Set sizes at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
}

#[derive(Debug, Default)]
struct FrontierState {
    pending: BTreeSet<String>,
    in_flight: BTreeSet<String>,
    done: BTreeSet<String>,
    /// Bumped on every mutation
    generation: u64,
}

impl FrontierState {
    fn is_known(&self, url: &str) -> bool {
        self.pending.contains(url) || self.in_flight.contains(url) || self.done.contains(url)
    }
}

/// Copy of the sets taken under the state lock, written outside it
struct Checkpoint {
    generation: u64,
    queue: Vec<String>,
    crawled: Vec<String>,
}

/// Shared pending/done URL state driving a crawl
#[derive(Debug)]
pub struct Frontier {
    scope_domain: String,
    state: Mutex<FrontierState>,
    files: Option<FrontierFiles>,
    /// Generation of the last checkpoint that reached disk
    written: Mutex<u64>,
    work_available: Notify,
}

impl Frontier {
    /// Builds a frontier that is never written to disk
    pub fn in_memory(seed: &str, scope_domain: impl Into<String>) -> Self {
        let frontier = Self::empty(scope_domain.into(), None);
        frontier.seed_if_empty(seed);
        frontier
    }

    /// Loads the persisted frontier, or seeds a new one
    ///
    /// URLs listed in both files are treated as done. Queue entries outside the
    /// scope domain are dropped. When both files are empty or missing, the
    /// frontier starts with `pending = {seed}`.
    pub fn initialize(
        seed: &str,
        scope_domain: impl Into<String>,
        files: FrontierFiles,
    ) -> Result<Self> {
        let queue = load_url_list(&files.queue)?;
        let crawled = load_url_list(&files.crawled)?;
        let frontier = Self::empty(scope_domain.into(), Some(files));

        {
            let mut state = frontier.lock();
            state.done.extend(crawled);

            let mut dropped = 0usize;
            for url in queue {
                if state.done.contains(&url) {
                    continue;
                }
                let in_scope = Url::parse(&url)
                    .map(|u| is_in_scope(&u, &frontier.scope_domain))
                    .unwrap_or(false);
                if in_scope {
                    state.pending.insert(url);
                } else {
                    dropped += 1;
                }
            }

            if dropped > 0 {
                tracing::debug!(dropped, "Dropped out-of-scope entries from persisted queue");
            }
            state.generation += 1;
            if !state.pending.is_empty() || !state.done.is_empty() {
                tracing::info!(
                    pending = state.pending.len(),
                    done = state.done.len(),
                    "Resuming from persisted frontier"
                );
            }
        }

        frontier.seed_if_empty(seed);
        frontier.flush();
        Ok(frontier)
    }

    fn empty(scope_domain: String, files: Option<FrontierFiles>) -> Self {
        Self {
            scope_domain,
            state: Mutex::new(FrontierState::default()),
            files,
            written: Mutex::new(0),
            work_available: Notify::new(),
        }
    }

    fn seed_if_empty(&self, seed: &str) {
        let mut state = self.lock();
        if state.pending.is_empty() && state.done.is_empty() {
            state.pending.insert(seed.to_string());
            state.generation += 1;
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registrable domain every queued URL belongs to
    pub fn scope_domain(&self) -> &str {
        &self.scope_domain
    }

    /// Moves one pending URL to the in-flight set
    ///
    /// Returns `None` without blocking when nothing is pending.
    pub fn claim(&self) -> Option<String> {
        let mut state = self.lock();
        let url = state.pending.pop_first()?;
        state.in_flight.insert(url.clone());
        state.generation += 1;
        Some(url)
    }

    /// Marks a claimed URL as done and queues its unseen in-scope links
    ///
    /// Links are normalized before the dedup check. Wakes idle workers and
    /// checkpoints the frontier. Returns how many links were newly queued.
    pub fn complete<I, S>(&self, url: &str, links: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = self.record_completion(url, links);
        self.flush();
        added
    }

    /// Same as [`Frontier::complete`], leaving the checkpoint to the caller
    pub fn record_completion<I, S>(&self, url: &str, links: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = {
            let mut state = self.lock();
            state.in_flight.remove(url);
            state.pending.remove(url);
            state.done.insert(url.to_string());

            let mut added = 0usize;
            for link in links {
                let Some(link) = scoped_link(link.as_ref(), &self.scope_domain) else {
                    continue;
                };
                if !state.is_known(&link) {
                    state.pending.insert(link);
                    added += 1;
                }
            }
            state.generation += 1;
            added
        };

        self.work_available.notify_waiters();
        added
    }

    /// Returns a claimed URL to `pending` without marking it done
    ///
    /// Used when a worker abandons a URL before finishing it. Unclaimed URLs
    /// are left alone. Returns true if the URL was in flight.
    pub fn release(&self, url: &str) -> bool {
        let released = {
            let mut state = self.lock();
            if state.in_flight.remove(url) {
                state.pending.insert(url.to_string());
                state.generation += 1;
                true
            } else {
                false
            }
        };

        if released {
            self.work_available.notify_waiters();
            self.flush();
        }
        released
    }

    /// Returns true when nothing is pending and no worker holds a URL
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    /// Waits until some worker completes a URL, or the timeout elapses
    pub async fn wait_for_work(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.work_available.notified()).await;
    }

    /// Wakes every task blocked in [`Frontier::wait_for_work`]
    pub fn wake_all(&self) {
        self.work_available.notify_waiters();
    }

    /// Writes both files if the in-memory state is newer than the last checkpoint
    ///
    /// A failed write is logged and retried by the next flush. A checkpoint
    /// taken before one that already reached disk is discarded. Returns false
    /// only when a write failed.
    pub fn flush(&self) -> bool {
        let Some(files) = &self.files else {
            return true;
        };

        let checkpoint = {
            let state = self.lock();
            Checkpoint {
                generation: state.generation,
                queue: state
                    .pending
                    .union(&state.in_flight)
                    .cloned()
                    .collect(),
                crawled: state.done.iter().cloned().collect(),
            }
        };

        let mut written = self.written.lock().unwrap_or_else(|p| p.into_inner());
        if checkpoint.generation <= *written {
            return true;
        }

        let result = write_url_list(&files.queue, &checkpoint.queue)
            .and_then(|()| write_url_list(&files.crawled, &checkpoint.crawled));

        match result {
            Ok(()) => {
                *written = checkpoint.generation;
                true
            }
            Err(e) => {
                tracing::warn!(
                    queue = %files.queue.display(),
                    error = %e,
                    "Failed to persist frontier, will retry on next update"
                );
                false
            }
        }
    }

    /// Returns true if the newest state has not reached disk yet
    pub fn is_dirty(&self) -> bool {
        if self.files.is_none() {
            return false;
        }
        let generation = self.lock().generation;
        let written = *self.written.lock().unwrap_or_else(|p| p.into_inner());
        generation > written
    }

    pub fn stats(&self) -> FrontierStats {
        let state = self.lock();
        FrontierStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            done: state.done.len(),
        }
    }

    /// Returns true if the URL has already been processed
    pub fn is_done(&self, url: &str) -> bool {
        self.lock().done.contains(url)
    }

    /// Returns true if the URL is pending, claimed or done
    pub fn is_known(&self, url: &str) -> bool {
        self.lock().is_known(url)
    }

    /// Sorted copy of the pending set
    pub fn pending_snapshot(&self) -> Vec<String> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Sorted copy of the done set
    pub fn done_snapshot(&self) -> Vec<String> {
        self.lock().done.iter().cloned().collect()
    }
}
