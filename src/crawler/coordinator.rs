//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drains the frontier:
//! - Resolving the seed and scope domain, resuming or seeding the frontier
//! - Gating every fetch on robots.txt and the politeness limiter
//! - Extracting, optionally summarizing and storing each page
//! - Filtering discovered links and merging them back into the frontier
//! - Detecting completion and recording the run outcome

use crate::config::Config;
use crate::crawler::{build_http_client, fetch_page, probe_seed, FetchOutcome};
use crate::extract::ExtractionPipeline;
use crate::frontier::{Frontier, FrontierFiles, FrontierStats};
use crate::ratelimit::RateLimiter;
use crate::robots::RobotsPolicy;
use crate::state::WorkerState;
use crate::storage::{PageRecord, PageStore, RunStatus, SqliteStorage};
use crate::summarize::Summarizer;
use crate::url::{is_in_scope, normalize_url, registrable_domain, scoped_link, url_registrable_domain};
use crate::{ConfigError, GatherError, UrlError};
use reqwest::Client;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// How long an idle worker waits for new links before re-checking
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Outcome of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub status: RunStatus,
    /// URLs completed during this run
    pub processed: usize,
    /// Records written during this run
    pub stored: usize,
    pub frontier: FrontierStats,
    pub elapsed: Duration,
}

/// How a page cycle ended
enum Cycle {
    /// The URL is done; these links go back to the frontier
    Finished(Vec<String>),
    /// Shutdown interrupted a wait; the URL must be crawled again
    Abandoned,
}

/// State shared by all workers
struct Shared {
    config: Config,
    frontier: Arc<Frontier>,
    robots: RobotsPolicy,
    web_limiter: Arc<RateLimiter>,
    summarizer: Option<Summarizer>,
    pipeline: ExtractionPipeline,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    run_id: i64,
    shutdown: watch::Sender<bool>,
    processed: AtomicUsize,
    stored: AtomicUsize,
}

/// Main crawler coordinator structure
///
/// Clones share the same crawl, so a clone can request shutdown while
/// another one is inside [`Coordinator::run`].
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Prepares a crawl: resolves scope, loads or seeds the frontier, opens
    /// the page store and records a new run
    ///
    /// With `fresh`, the persisted frontier is deleted first. A run that
    /// starts without a persisted frontier sends a HEAD request to the seed and
    /// aborts if the host cannot be reached.
    pub async fn new(config: Config, config_hash: &str, fresh: bool) -> Result<Self, GatherError> {
        let seed = normalize_url(&config.crawl.seed_url)?;
        let scope = scope_domain(&config, &seed)?;

        let files = FrontierFiles::new(config.queue_path(), config.crawled_path());
        if fresh {
            tracing::info!(dir = %config.project_dir().display(), "Discarding persisted frontier");
            files.remove()?;
        }

        let client = build_http_client(&config)?;

        if !files.exist() {
            let status = probe_seed(&client, &config.user_agent, seed.as_str()).await?;
            tracing::debug!(seed = %seed, status, "Seed is reachable");
        }

        let frontier = Frontier::initialize(seed.as_str(), scope.clone(), files)?;

        let mut storage = SqliteStorage::new(&config.database_path())?;
        if let Some(previous) = storage.get_latest_run()? {
            if previous.status == RunStatus::Running {
                tracing::warn!(run = previous.id, "Previous run did not finish, marking it interrupted");
                storage.finish_run(previous.id, RunStatus::Interrupted)?;
            }
        }
        let run_id = storage.create_run(config_hash)?;

        let politeness = &config.politeness;
        let web_limiter = Arc::new(
            RateLimiter::new(
                "web",
                politeness.requests_per_minute,
                politeness.requests_per_day,
            )
            .with_jitter(politeness.jitter_min_ms, politeness.jitter_max_ms),
        );

        let robots = RobotsPolicy::new(
            client.clone(),
            seed.scheme(),
            config.user_agent.clone(),
            config.robots.on_failure,
        )
        .with_limiter(Arc::clone(&web_limiter));

        let summarizer = if config.summarization.enabled {
            let summarizer = Summarizer::from_env(client.clone(), &config.summarization)?;
            tracing::info!(model = summarizer.model(), "Summarization enabled");
            Some(summarizer)
        } else {
            None
        };

        let pipeline = ExtractionPipeline::new(&config.extraction);

        tracing::info!(run = run_id, seed = %seed, scope = %scope, "Crawl prepared");

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                frontier: Arc::new(frontier),
                robots,
                web_limiter,
                summarizer,
                pipeline,
                storage: Arc::new(Mutex::new(storage)),
                client,
                run_id,
                shutdown: watch::channel(false).0,
                processed: AtomicUsize::new(0),
                stored: AtomicUsize::new(0),
            }),
        })
    }

    pub fn frontier(&self) -> &Frontier {
        &self.shared.frontier
    }

    pub fn run_id(&self) -> i64 {
        self.shared.run_id
    }

    /// Stops the crawl
    ///
    /// Workers stop claiming URLs. A worker waiting on robots.txt, the rate
    /// limiter or the summarizer gives its URL back to the queue and exits,
    /// and idle workers are woken so they see the request.
    pub fn request_shutdown(&self) {
        self.shared.shutdown.send_replace(true);
        self.shared.frontier.wake_all();
    }

    /// Runs the worker pool until the frontier is exhausted or shutdown is requested
    pub async fn run(&self) -> Result<CrawlSummary, GatherError> {
        let threads = self.shared.config.crawl.threads.max(1) as usize;
        let start = Instant::now();

        tracing::info!(
            run = self.shared.run_id,
            threads,
            pending = self.shared.frontier.stats().pending,
            "Starting workers"
        );

        let mut workers = JoinSet::new();
        for id in 0..threads {
            let shared = Arc::clone(&self.shared);
            workers.spawn(async move { shared.worker(id).await });
        }

        join_workers(workers, || self.request_shutdown()).await;

        let frontier = &self.shared.frontier;
        frontier.flush();
        if frontier.is_dirty() {
            tracing::warn!("Final frontier checkpoint failed; in-memory state was newer than disk");
        }

        let status = if frontier.is_exhausted() {
            RunStatus::Completed
        } else {
            RunStatus::Interrupted
        };

        {
            let mut storage = self.shared.lock_storage();
            if let Err(e) = storage.finish_run(self.shared.run_id, status) {
                tracing::warn!(run = self.shared.run_id, error = %e, "Failed to record run outcome");
            }
        }

        let summary = CrawlSummary {
            run_id: self.shared.run_id,
            status,
            processed: self.shared.processed.load(Ordering::Relaxed),
            stored: self.shared.stored.load(Ordering::Relaxed),
            frontier: frontier.stats(),
            elapsed: start.elapsed(),
        };

        tracing::info!(
            status = status.to_db_string(),
            processed = summary.processed,
            stored = summary.stored,
            queued = summary.frontier.pending,
            crawled = summary.frontier.done,
            "Crawl finished in {:?}",
            summary.elapsed
        );

        Ok(summary)
    }
}

impl Shared {
    fn lock_storage(&self) -> std::sync::MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs `work` unless shutdown is requested first
    async fn until_shutdown<F: Future>(&self, work: F) -> Option<F::Output> {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => None,
            output = work => Some(output),
        }
    }

    async fn worker(&self, id: usize) -> Result<(), GatherError> {
        let mut state = WorkerState::Idle;

        loop {
            if self.stopping() {
                break;
            }

            let Some(url) = self.frontier.claim() else {
                if self.frontier.is_exhausted() {
                    break;
                }
                self.frontier.wait_for_work(IDLE_WAIT).await;
                continue;
            };

            let stats = self.frontier.stats();
            tracing::info!(
                worker = id,
                url = %url,
                queued = stats.pending,
                crawled = stats.done,
                "Now crawling"
            );

            state.transition(WorkerState::Fetching)?;
            let cycle = match self.process(id, &url, &mut state).await {
                Ok(cycle) => cycle,
                Err(e) => {
                    tracing::warn!(worker = id, url = %url, error = %e, "Page cycle failed");
                    Cycle::Finished(Vec::new())
                }
            };

            state.transition(WorkerState::Updating)?;
            match cycle {
                Cycle::Finished(links) => {
                    let added = self.frontier.record_completion(&url, &links);
                    self.checkpoint().await;
                    self.processed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(worker = id, url = %url, added, "Completed");
                }
                Cycle::Abandoned => {
                    self.frontier.release(&url);
                    tracing::debug!(worker = id, url = %url, "Returned to queue on shutdown");
                }
            }
            state.transition(WorkerState::Idle)?;
        }

        state.transition(WorkerState::Stopped)?;
        tracing::debug!(worker = id, "Worker stopped");
        Ok(())
    }

    /// One fetch-extract-store cycle
    async fn process(
        &self,
        id: usize,
        url: &str,
        state: &mut WorkerState,
    ) -> Result<Cycle, GatherError> {
        let parsed_url = Url::parse(url)?;
        let agent = &self.config.user_agent.crawler_name;

        let Some(permitted) = self.until_shutdown(self.robots.permits(agent, &parsed_url)).await
        else {
            return Ok(Cycle::Abandoned);
        };
        if !permitted {
            tracing::debug!(worker = id, url, "Disallowed by robots.txt");
            return Ok(Cycle::Finished(Vec::new()));
        }

        if self.until_shutdown(self.web_limiter.acquire()).await.is_none() {
            return Ok(Cycle::Abandoned);
        }

        let (final_url, body) = match fetch_page(&self.client, &self.config.user_agent, url).await {
            FetchOutcome::Html { final_url, body, .. } => (final_url, body),
            FetchOutcome::NotHtml { content_type } => {
                tracing::debug!(worker = id, url, content_type, "Skipping non-HTML content");
                return Ok(Cycle::Finished(Vec::new()));
            }
            FetchOutcome::Failed { error } => {
                tracing::warn!(worker = id, url, error, "Fetch failed");
                return Ok(Cycle::Finished(Vec::new()));
            }
        };

        state.transition(WorkerState::Extracting)?;

        let base = Url::parse(&final_url).unwrap_or_else(|_| parsed_url.clone());
        let page = self.pipeline.parse(&body, &base);

        let summary = match &self.summarizer {
            Some(summarizer) if !page.text.trim().is_empty() => {
                match self.until_shutdown(summarizer.summarize(&page.text)).await {
                    Some(summary) => Some(summary),
                    None => return Ok(Cycle::Abandoned),
                }
            }
            _ => None,
        };

        self.store(PageRecord::from_parsed(url, &page, summary)).await;

        match self.until_shutdown(self.admissible_links(&page.links)).await {
            Some(links) => Ok(Cycle::Finished(links)),
            None => Ok(Cycle::Abandoned),
        }
    }

    /// Writes the frontier files off the async worker threads
    async fn checkpoint(&self) {
        let frontier = Arc::clone(&self.frontier);
        if let Err(e) = tokio::task::spawn_blocking(move || frontier.flush()).await {
            tracing::warn!(error = %e, "Frontier checkpoint task failed");
        }
    }

    async fn store(&self, record: PageRecord) {
        let storage = Arc::clone(&self.storage);
        let run_id = self.run_id;
        let url = record.url.clone();

        let inserted = tokio::task::spawn_blocking(move || {
            let mut storage = storage.lock().unwrap_or_else(|p| p.into_inner());
            storage.insert_page_if_absent(&record, Some(run_id))
        })
        .await;

        match inserted {
            Ok(Ok(true)) => {
                self.stored.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(false)) => tracing::debug!(url = %url, "Record already stored"),
            Ok(Err(e)) => tracing::warn!(url = %url, error = %e, "Failed to store page record"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Store task failed"),
        }
    }

    /// Keeps unseen, in-scope links that robots.txt allows
    async fn admissible_links(&self, links: &[String]) -> Vec<String> {
        let scope = self.frontier.scope_domain();
        let agent = &self.config.user_agent.crawler_name;
        let mut seen = HashSet::new();
        let mut admitted = Vec::new();

        for link in links {
            let Some(normalized) = scoped_link(link, scope) else {
                continue;
            };
            if !seen.insert(normalized.clone()) || self.frontier.is_known(&normalized) {
                continue;
            }
            let Ok(parsed) = Url::parse(&normalized) else {
                continue;
            };
            if self.robots.permits(agent, &parsed).await {
                admitted.push(normalized);
            } else {
                tracing::debug!(url = %normalized, "Discovered link disallowed by robots.txt");
            }
        }

        admitted
    }
}

/// Resolves once the shutdown flag is set
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: no shutdown can arrive any more
            std::future::pending::<()>().await;
        }
    }
}

/// Awaits every worker, calling `on_failure` when one errors or panics
///
/// A worker that dies leaves its claimed URL in flight, so the frontier can
/// never drain. Stopping the others lets the run end as interrupted.
async fn join_workers<F>(mut workers: JoinSet<Result<(), GatherError>>, on_failure: F)
where
    F: Fn(),
{
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => tracing::error!(error = %e, "Worker stopped with error"),
            Err(e) => tracing::error!(error = %e, "Worker task failed"),
        }
        tracing::warn!("Stopping remaining workers");
        on_failure();
    }
}

/// Resolves the registrable domain the crawl is confined to
fn scope_domain(config: &Config, seed: &Url) -> Result<String, GatherError> {
    let seed_domain = url_registrable_domain(seed).ok_or(UrlError::MissingDomain)?;

    let scope = match &config.crawl.domain {
        Some(domain) => registrable_domain(domain),
        None => seed_domain,
    };

    if !is_in_scope(seed, &scope) {
        return Err(ConfigError::Validation(format!(
            "seed URL {} is outside the crawl domain {}",
            seed, scope
        ))
        .into());
    }

    Ok(scope)
}
