//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::path::Path;
use std::time::Duration;
use sumi_gather::config::{parse_config, Config};
use sumi_gather::crawler::Coordinator;
use sumi_gather::frontier::load_url_list;
use sumi_gather::storage::{PageStore, RunStatus, SqliteStorage};
use tempfile::TempDir;
use wiremock::http::Method;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seed` into `data_dir`
fn create_test_config(seed: &str, data_dir: &Path, threads: u32, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[project]
name = "site"
data-dir = '{}'

[crawl]
seed-url = "{}"
threads = {}
request-timeout-secs = 5

[user-agent]
crawler-name = "TestBot"
pool = ["TestBrowser/1.0"]

[politeness]
requests-per-minute = 60000
jitter-min-ms = 0
jitter-max-ms = 0
{}
"#,
        data_dir.display(),
        seed,
        threads,
        extra
    ))
    .expect("test config should be valid")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn crawled_urls(config: &Config) -> Vec<String> {
    load_url_list(&config.crawled_path()).unwrap()
}

async fn crawl(config: Config, fresh: bool) -> sumi_gather::crawler::CrawlSummary {
    let coordinator = Coordinator::new(config, "test-hash", fresh)
        .await
        .expect("coordinator should start");
    coordinator.run().await.expect("crawl should finish")
}

#[tokio::test]
async fn test_seed_without_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/", "<html><head><title>Home</title></head><body><p>Only page</p></body></html>").await;

    let config = create_test_config(&seed, dir.path(), 2, "");
    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(summary.frontier.pending, 0);
    assert_eq!(crawled_urls(&config), vec![seed.clone()]);
    assert!(load_url_list(&config.queue_path()).unwrap().is_empty());

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    let page = storage.get_page_by_url(&seed).unwrap().unwrap();
    assert_eq!(page.title, "Home");
    assert!(page.text.contains("Only page"));
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="{}/page2#top">Page 2</a>
            <a href="/page1">Page 1 again</a>
            </body></html>"#,
            base
        ),
    )
    .await;
    mount_page(
        &server,
        "/page1",
        r#"<html><head><title>One</title></head><body>
        <time datetime="2023-01-05">Jan 5</time><p>First post</p>
        <a href="/">Home</a><a href="/page3">Three</a>
        </body></html>"#,
    )
    .await;
    mount_page(&server, "/page2", "<html><body><p>Posted on 2023-02-10</p></body></html>").await;
    mount_page(&server, "/page3", "<html><head><title>Three</title></head><body></body></html>").await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 3, "");
    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.processed, 4);

    let mut expected = vec![
        format!("{}/", base),
        format!("{}/page1", base),
        format!("{}/page2", base),
        format!("{}/page3", base),
    ];
    expected.sort();
    assert_eq!(crawled_urls(&config), expected);

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    assert_eq!(storage.count_pages().unwrap(), 4);

    let page1 = storage.get_page_by_url(&format!("{}/page1", base)).unwrap().unwrap();
    assert_eq!(page1.date_strategy_label(), "1");

    let page2 = storage.get_page_by_url(&format!("{}/page2", base)).unwrap().unwrap();
    assert_eq!(page2.title, "No Title");
    assert_eq!(page2.date_strategy_label(), "4");

    // Every page is fetched exactly once
    let requests = server.received_requests().await.unwrap();
    let page_fetches = requests
        .iter()
        .filter(|r| r.method == Method::Get && r.url.path() != "/robots.txt")
        .count();
    assert_eq!(page_fetches, 4);
}

#[tokio::test]
async fn test_cross_domain_links_not_queued() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();
    let port = url::Url::parse(&base).unwrap().port().unwrap();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><body>
            <a href="http://localhost:{}/elsewhere">Same server, other host</a>
            <a href="https://other.example/page">External</a>
            <a href="mailto:someone@example.com">Mail</a>
            </body></html>"#,
            port
        ),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 1, "");
    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(crawled_urls(&config), vec![format!("{}/", base)]);
}

#[tokio::test]
async fn test_robots_disallowed_links_never_fetched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/private/secret">Secret</a><a href="/public">Public</a></body></html>"#,
    )
    .await;
    mount_page(&server, "/public", "<html><body><p>Public</p></body></html>").await;

    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 2, "");
    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.processed, 2);
    let crawled = crawled_urls(&config);
    assert!(!crawled.iter().any(|u| u.contains("/private")));

    let robots_fetches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/robots.txt")
        .count();
    assert_eq!(robots_fetches, 1);
}

#[tokio::test]
async fn test_resume_never_refetches_done_urls() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/", r#"<html><body><a href="/a">A</a></body></html>"#).await;
    mount_page(&server, "/a", "<html><body><p>A</p></body></html>").await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 2, "");
    let first = crawl(config.clone(), false).await;
    assert_eq!(first.status, RunStatus::Completed);
    let after_first = server.received_requests().await.unwrap().len();

    let second = crawl(config.clone(), false).await;
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.processed, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), after_first);
}

#[tokio::test]
async fn test_resume_picks_up_persisted_queue() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/next", "<html><body><p>Next</p></body></html>").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 1, "");
    std::fs::create_dir_all(config.project_dir()).unwrap();
    // A claimed URL left in the queue by an interrupted run
    std::fs::write(config.queue_path(), format!("{}/next\n", base)).unwrap();
    std::fs::write(config.crawled_path(), format!("{}/\n", base)).unwrap();

    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.processed, 1);
    let mut expected = vec![format!("{}/", base), format!("{}/next", base)];
    expected.sort();
    assert_eq!(crawled_urls(&config), expected);
}

#[tokio::test]
async fn test_fresh_run_does_not_duplicate_records() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/", "<html><head><title>Home</title></head><body>Hello</body></html>").await;

    let config = create_test_config(&seed, dir.path(), 1, "");
    let first = crawl(config.clone(), false).await;
    let second = crawl(config.clone(), true).await;

    assert_eq!(first.stored, 1);
    assert_eq!(second.processed, 1);
    assert_eq!(second.stored, 0);

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    assert_eq!(storage.count_pages().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_pages_are_done_without_records() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/",
        r#"<html><body>
        <a href="/broken">Broken</a>
        <a href="/doc.pdf">Report</a>
        <a href="/ok">Fine</a>
        </body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;
    mount_page(&server, "/ok", "<html><head><title>Fine</title></head><body><p>Still crawled</p></body></html>").await;

    let config = create_test_config(&format!("{}/", base), dir.path(), 2, "");
    let summary = crawl(config.clone(), false).await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.stored, 2);

    let mut expected = vec![
        format!("{}/", base),
        format!("{}/broken", base),
        format!("{}/doc.pdf", base),
        format!("{}/ok", base),
    ];
    expected.sort();
    assert_eq!(crawled_urls(&config), expected);
    assert!(load_url_list(&config.queue_path()).unwrap().is_empty());

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    assert_eq!(storage.count_pages().unwrap(), 2);
    assert!(storage.get_page_by_url(&format!("{}/broken", base)).unwrap().is_none());
    assert!(storage.get_page_by_url(&format!("{}/doc.pdf", base)).unwrap().is_none());
    assert_eq!(
        storage.get_page_by_url(&format!("{}/ok", base)).unwrap().unwrap().title,
        "Fine"
    );
}

#[tokio::test]
async fn test_shutdown_interrupts_daily_quota_wait() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/", r#"<html><body><a href="/a">A</a></body></html>"#).await;
    mount_page(&server, "/a", "<html><body><p>A</p></body></html>").await;

    // robots.txt and the seed use up the whole day
    let mut config = create_test_config(&format!("{}/", base), dir.path(), 1, "");
    config.politeness.requests_per_day = 2;

    let coordinator = Coordinator::new(config.clone(), "test-hash", false)
        .await
        .expect("coordinator should start");
    let stopper = coordinator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stopper.request_shutdown();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("shutdown should end the run")
        .expect("crawl should finish");

    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.processed, 1);
    assert_eq!(crawled_urls(&config), vec![format!("{}/", base)]);
    assert_eq!(
        load_url_list(&config.queue_path()).unwrap(),
        vec![format!("{}/a", base)]
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/a"));

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Interrupted
    );
}

#[tokio::test]
async fn test_unreachable_seed_aborts() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9/", dir.path(), 1, "");

    let result = Coordinator::new(config.clone(), "h", true).await;
    assert!(matches!(
        result,
        Err(sumi_gather::GatherError::SeedUnreachable { .. })
    ));
    assert!(!config.queue_path().exists());
}

#[tokio::test]
async fn test_summaries_are_stored() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let seed = format!("{}/", server.uri());

    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_page(&server, "/", "<html><body><p>Long article text</p></body></html>").await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemma-3-27b-it:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "An article." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    std::env::set_var("SUMI_GATHER_TEST_KEY", "test-key");
    let config = create_test_config(
        &seed,
        dir.path(),
        1,
        &format!(
            "\n[summarization]\nenabled = true\nendpoint = \"{}\"\napi-key-env = \"SUMI_GATHER_TEST_KEY\"\n",
            server.uri()
        ),
    );
    crawl(config.clone(), false).await;

    let storage = SqliteStorage::new(&config.database_path()).unwrap();
    let page = storage.get_page_by_url(&seed).unwrap().unwrap();
    assert_eq!(page.summary.as_deref(), Some("An article."));
    assert_eq!(storage.count_summarized().unwrap(), 1);
}
