//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building the shared HTTP client
//! - GET requests with a user agent drawn from the configured pool
//! - Classifying responses into HTML, non-HTML and failures
//! - The HEAD probe that checks the seed is reachable

use crate::config::{Config, UserAgentConfig};
use crate::GatherError;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// A 2xx response with an HTML body
    Html {
        /// Final URL after redirects
        final_url: String,
        status_code: u16,
        body: String,
    },

    /// A 2xx response that is not HTML
    NotHtml { content_type: String },

    /// Non-2xx status, network failure or undecodable body
    Failed { error: String },
}

/// Builds the HTTP client shared by page, robots.txt and summarizer requests
///
/// The per-request user agent header is set by the caller.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.crawler_name.as_str())
        .timeout(Duration::from_secs(config.crawl.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page with a randomly chosen user agent
pub async fn fetch_page(client: &Client, agents: &UserAgentConfig, url: &str) -> FetchOutcome {
    let response = match client
        .get(url)
        .header(header::USER_AGENT, agents.random_agent())
        .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => return FetchOutcome::Failed { error: describe(&e) },
    };

    let status = response.status();
    if !status.is_success() {
        return FetchOutcome::Failed {
            error: format!("HTTP {}", status.as_u16()),
        };
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.to_ascii_lowercase().contains("text/html") {
        return FetchOutcome::NotHtml { content_type };
    }

    let final_url = response.url().to_string();
    match response.text().await {
        Ok(body) => FetchOutcome::Html {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(e) => FetchOutcome::Failed {
            error: format!("Failed to read body: {}", describe(&e)),
        },
    }
}

/// Sends a HEAD request to the seed
///
/// Only a transport failure is an error; any HTTP status means the host
/// answered.
pub async fn probe_seed(client: &Client, agents: &UserAgentConfig, url: &str) -> Result<u16, GatherError> {
    client
        .head(url)
        .header(header::USER_AGENT, agents.random_agent())
        .send()
        .await
        .map(|response| response.status().as_u16())
        .map_err(|e| GatherError::SeedUnreachable {
            url: url.to_string(),
            reason: describe(&e),
        })
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else if e.is_decode() {
        format!("Decode error: {}", e)
    } else {
        e.to_string()
    }
}
