//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and response classification
//! - The seed reachability probe
//! - The worker pool that drains the frontier

mod coordinator;
mod fetcher;

pub use coordinator::{Coordinator, CrawlSummary};
pub use fetcher::{build_http_client, fetch_page, probe_seed, FetchOutcome};

use crate::config::Config;
use crate::GatherError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Resolve the scope domain and load or seed the frontier
/// 2. Open the page store and record a new run
/// 3. Run the worker pool until the frontier is exhausted
/// 4. Record whether the run completed
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stored on the run row
/// * `fresh` - Discard any persisted frontier before starting
pub async fn crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<CrawlSummary, GatherError> {
    let coordinator = Coordinator::new(config, config_hash, fresh).await?;
    coordinator.run().await
}
