//! Robots.txt handling module
//!
//! [`RobotsPolicy`] answers "may this agent fetch this URL?" for any host. The
//! first query for a host downloads `/robots.txt` from that host; the parsed
//! rules are cached for the rest of the run.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

use crate::config::{RobotsFailurePolicy, UserAgentConfig};
use crate::ratelimit::RateLimiter;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Fetch-permission gate backed by a per-host robots.txt cache
#[derive(Debug)]
pub struct RobotsPolicy {
    client: Client,
    /// Scheme used for every robots.txt request, taken from the seed
    scheme: String,
    user_agents: UserAgentConfig,
    on_failure: RobotsFailurePolicy,
    /// Shared with page fetches so robots.txt requests count against the same budget
    limiter: Option<Arc<RateLimiter>>,
    cache: RobotsCache,
}

impl RobotsPolicy {
    pub fn new(
        client: Client,
        scheme: impl Into<String>,
        user_agents: UserAgentConfig,
        on_failure: RobotsFailurePolicy,
    ) -> Self {
        Self {
            client,
            scheme: scheme.into(),
            user_agents,
            on_failure,
            limiter: None,
            cache: RobotsCache::new(),
        }
    }

    /// Throttles robots.txt downloads through `limiter`
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// URLs without a host are refused.
    pub async fn permits(&self, user_agent: &str, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return false;
        };

        let robots = self
            .cache
            .get_or_fetch(&host, || self.fetch(&host))
            .await;

        robots.is_allowed(url.as_str(), user_agent)
    }

    /// Number of robots.txt downloads performed so far
    pub fn fetch_count(&self) -> usize {
        self.cache.fetch_count()
    }

    async fn fetch(&self, host: &str) -> ParsedRobots {
        let robots_url = format!("{}://{}/robots.txt", self.scheme, host);
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        tracing::debug!(url = %robots_url, "Fetching robots.txt");

        let response = match self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, self.user_agents.random_agent())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.unavailable(host, &e.to_string()),
        };

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!(host, status = status.as_u16(), "No robots.txt, allowing all");
            return ParsedRobots::allow_all();
        }
        if !status.is_success() {
            return self.unavailable(host, &format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => self.unavailable(host, &e.to_string()),
        }
    }

    fn unavailable(&self, host: &str, reason: &str) -> ParsedRobots {
        match self.on_failure {
            RobotsFailurePolicy::Allow => {
                tracing::warn!(host, reason, "robots.txt unavailable, allowing all");
                ParsedRobots::allow_all()
            }
            RobotsFailurePolicy::Deny => {
                tracing::warn!(host, reason, "robots.txt unavailable, denying all");
                ParsedRobots::deny_all()
            }
        }
    }
}

/// Cache key for a URL: host plus explicit port
fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agents() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "SumiGather".to_string(),
            pool: vec!["TestBrowser/1.0".to_string()],
        }
    }

    fn policy(server: &MockServer, on_failure: RobotsFailurePolicy) -> RobotsPolicy {
        let scheme = Url::parse(&server.uri()).unwrap().scheme().to_string();
        RobotsPolicy::new(Client::new(), scheme, agents(), on_failure)
    }

    fn page(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_host_key_includes_port() {
        let url = Url::parse("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("127.0.0.1:8080"));

        let url = Url::parse("https://Example.com/a").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_disallow_rules_applied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let robots = policy(&server, RobotsFailurePolicy::Allow);

        assert!(robots.permits("SumiGather", &page(&server, "/")).await);
        assert!(!robots.permits("SumiGather", &page(&server, "/private/x")).await);
        assert!(robots.permits("SumiGather", &page(&server, "/public")).await);
        assert_eq!(robots.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_queries_fetch_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /x")
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let robots = policy(&server, RobotsFailurePolicy::Allow);
        let (a, b, c) = (page(&server, "/a"), page(&server, "/x"), page(&server, "/c"));

        let (ra, rb, rc) = tokio::join!(
            robots.permits("SumiGather", &a),
            robots.permits("SumiGather", &b),
            robots.permits("SumiGather", &c),
        );

        assert!(ra && !rb && rc);
        assert_eq!(robots.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let robots = policy(&server, RobotsFailurePolicy::Deny);
        assert!(robots.permits("SumiGather", &page(&server, "/anything")).await);
    }

    #[tokio::test]
    async fn test_server_error_fails_open_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let robots = policy(&server, RobotsFailurePolicy::Allow);
        assert!(robots.permits("SumiGather", &page(&server, "/page")).await);
    }

    #[tokio::test]
    async fn test_server_error_fails_closed_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let robots = policy(&server, RobotsFailurePolicy::Deny);
        assert!(!robots.permits("SumiGather", &page(&server, "/page")).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_uses_failure_policy() {
        // Nothing listens on port 9 on localhost
        let url = Url::parse("http://127.0.0.1:9/page").unwrap();

        let open = RobotsPolicy::new(Client::new(), "http", agents(), RobotsFailurePolicy::Allow);
        assert!(open.permits("SumiGather", &url).await);

        let closed = RobotsPolicy::new(Client::new(), "http", agents(), RobotsFailurePolicy::Deny);
        assert!(!closed.permits("SumiGather", &url).await);
    }

    #[tokio::test]
    async fn test_robots_download_counts_against_limiter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .mount(&server)
            .await;

        let limiter = Arc::new(RateLimiter::new("web", 60_000, 100));
        let robots =
            policy(&server, RobotsFailurePolicy::Allow).with_limiter(Arc::clone(&limiter));

        assert!(robots.permits("SumiGather", &page(&server, "/a")).await);
        assert!(robots.permits("SumiGather", &page(&server, "/b")).await);

        // Cached rules do not take another slot
        assert_eq!(limiter.snapshot().await.daily_count, 1);
    }
}
