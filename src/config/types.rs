use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Sumi-Gather
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

impl Config {
    /// Directory holding the frontier files, page store and exports
    pub fn project_dir(&self) -> PathBuf {
        PathBuf::from(&self.project.data_dir).join(&self.project.name)
    }

    pub fn queue_path(&self) -> PathBuf {
        self.project_dir().join("queue.txt")
    }

    pub fn crawled_path(&self) -> PathBuf {
        self.project_dir().join("crawled.txt")
    }

    pub fn database_path(&self) -> PathBuf {
        self.project_dir().join("pages.db")
    }

    pub fn export_path(&self) -> PathBuf {
        self.project_dir().join("data.json")
    }
}

/// Project naming and on-disk location
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Name of the project; also the directory name under `data-dir`
    pub name: String,

    /// Parent directory for project directories
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,
}

/// Crawl target and worker pool settings
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Page the crawl starts from
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Registrable domain to stay within; derived from the seed when absent
    #[serde(default)]
    pub domain: Option<String>,

    /// Number of concurrent workers
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Product token matched against robots.txt `User-agent` groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// User agent strings rotated across requests
    #[serde(default = "default_user_agent_pool")]
    pub pool: Vec<String>,
}

impl UserAgentConfig {
    /// Picks a user agent string from the pool at random
    ///
    /// Falls back to the crawler name when the pool is empty.
    pub fn random_agent(&self) -> &str {
        self.pool
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(&self.crawler_name)
    }
}

/// Throttle applied to page fetches
#[derive(Debug, Clone, Deserialize)]
pub struct PolitenessConfig {
    #[serde(rename = "requests-per-minute", default = "default_web_rpm")]
    pub requests_per_minute: u32,

    #[serde(rename = "requests-per-day", default = "default_web_rpd")]
    pub requests_per_day: u32,

    /// Lower bound of the random delay added on top of the per-minute spacing
    #[serde(rename = "jitter-min-ms", default = "default_jitter_min")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random delay added on top of the per-minute spacing
    #[serde(rename = "jitter-max-ms", default = "default_jitter_max")]
    pub jitter_max_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_web_rpm(),
            requests_per_day: default_web_rpd(),
            jitter_min_ms: default_jitter_min(),
            jitter_max_ms: default_jitter_max(),
        }
    }
}

/// What to do when a host's robots.txt cannot be retrieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotsFailurePolicy {
    /// Treat the host as having no rules
    #[default]
    Allow,
    /// Refuse every URL on the host
    Deny,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RobotsConfig {
    #[serde(rename = "on-failure", default)]
    pub on_failure: RobotsFailurePolicy,
}

/// Elements stripped before text extraction
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(rename = "exclude-tags", default = "default_exclude_tags")]
    pub exclude_tags: Vec<String>,

    /// Class names; an element is stripped when its class attribute contains one
    #[serde(rename = "exclude-classes", default = "default_exclude_classes")]
    pub exclude_classes: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            exclude_tags: default_exclude_tags(),
            exclude_classes: default_exclude_classes(),
        }
    }
}

/// External summarization settings
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Name of the entry in `models` to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the generative language API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Page text is truncated to this many characters before sending
    #[serde(rename = "max-input-chars", default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Quotas per model
    #[serde(default = "default_models")]
    pub models: Vec<ModelQuota>,
}

impl SummarizationConfig {
    /// Returns the quota entry for the selected model
    pub fn selected_quota(&self) -> Option<&ModelQuota> {
        self.models.iter().find(|m| m.name == self.model)
    }
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            max_input_chars: default_max_input_chars(),
            models: default_models(),
        }
    }
}

/// Request budget of one summarization model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelQuota {
    pub name: String,

    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    #[serde(rename = "requests-per-day")]
    pub requests_per_day: u32,
}

fn default_data_dir() -> String {
    ".".to_string()
}

fn default_threads() -> u32 {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent_pool() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
    ]
}

fn default_web_rpm() -> u32 {
    60
}

fn default_web_rpd() -> u32 {
    100_000
}

fn default_jitter_min() -> u64 {
    100
}

fn default_jitter_max() -> u64 {
    600
}

fn default_exclude_tags() -> Vec<String> {
    ["nav", "script", "style", "header", "footer", "figure"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_classes() -> Vec<String> {
    [
        "header__inner",
        "social-share__title",
        "social-share__items",
        "content-group__title",
        "content-group__body",
        "footer__column",
        "footer__column-content",
        "footer__logo",
        "footer__details",
        "footer__address",
        "footer__copyright",
        "footer__social",
        "footer__social-link",
        "footer__social-icon",
        "footer__social-text",
        "simple-menu__link",
        "simple-menu__item",
        "simple-menu__list",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model() -> String {
    "gemma-3-27b-it".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_input_chars() -> usize {
    30_000
}

fn default_models() -> Vec<ModelQuota> {
    vec![
        ModelQuota {
            name: "gemini-1.5-flash".to_string(),
            requests_per_minute: 15,
            requests_per_day: 1500,
        },
        ModelQuota {
            name: "gemma-3-27b-it".to_string(),
            requests_per_minute: 30,
            requests_per_day: 14400,
        },
    ]
}
